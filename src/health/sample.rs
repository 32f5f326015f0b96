//! Health samples and status derivation.

use serde::{Deserialize, Serialize};

use crate::config::HealthThresholds;
use crate::registry::{LiveMetrics, ServerId};

/// Coarse health state, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Offline,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Offline => "offline",
        }
    }

    /// Critical and offline servers are failover candidates.
    pub fn needs_failover(&self) -> bool {
        matches!(self, HealthStatus::Critical | HealthStatus::Offline)
    }
}

/// Raw metrics pushed by a media server. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthMetrics {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub memory_total: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_usage: Option<f64>,
    pub disk_total: Option<u64>,
    pub disk_used: Option<u64>,
    pub network_in: Option<u64>,
    pub network_out: Option<u64>,
    pub bandwidth: Option<f64>,
    #[serde(rename = "ffmpegProcesses")]
    pub ffmpeg_process_count: Option<u32>,
    pub active_streams: Option<u32>,
    pub active_connections: Option<u32>,
    pub response_time: Option<f64>,
    pub last_error: Option<String>,
}

fn percent(used: Option<u64>, total: Option<u64>) -> Option<f64> {
    match (used, total) {
        (Some(used), Some(total)) if total > 0 => Some(used as f64 * 100.0 / total as f64),
        _ => None,
    }
}

impl HealthMetrics {
    /// Reported memory usage, or used/total when only the raw numbers were sent.
    pub fn effective_memory_usage(&self) -> Option<f64> {
        self.memory_usage
            .or_else(|| percent(self.memory_used, self.memory_total))
    }

    /// Reported disk usage, or used/total when only the raw numbers were sent.
    pub fn effective_disk_usage(&self) -> Option<f64> {
        self.disk_usage.or_else(|| percent(self.disk_used, self.disk_total))
    }

    pub(crate) fn live(&self, timestamp: u64) -> LiveMetrics {
        LiveMetrics {
            cpu_usage: self.cpu_usage,
            memory_usage: self.effective_memory_usage(),
            bandwidth: self.bandwidth,
            last_checked: Some(timestamp),
        }
    }
}

fn level(value: Option<f64>, warning: f64, critical: f64) -> HealthStatus {
    match value {
        Some(v) if v > critical => HealthStatus::Critical,
        Some(v) if v > warning => HealthStatus::Warning,
        _ => HealthStatus::Healthy,
    }
}

/// Derive a status from raw metrics: each metric is graded on its own and the worst wins.
/// Missing metrics count as nominal.
pub fn derive_status(metrics: &HealthMetrics, t: &HealthThresholds) -> HealthStatus {
    [
        level(metrics.cpu_usage, t.cpu_warning, t.cpu_critical),
        level(metrics.effective_memory_usage(), t.memory_warning, t.memory_critical),
        level(metrics.effective_disk_usage(), t.disk_warning, t.disk_critical),
    ]
    .into_iter()
    .max()
    .unwrap_or(HealthStatus::Healthy)
}

/// One timestamped snapshot of a server's resource metrics. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub server_id: ServerId,
    /// Unix millis.
    pub timestamp: u64,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
    pub status: HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(v: f64) -> HealthMetrics {
        HealthMetrics {
            cpu_usage: Some(v),
            memory_usage: Some(40.0),
            disk_usage: Some(50.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_cpu_levels() {
        let t = HealthThresholds::default();
        for v in [90.5, 95.0, 100.0] {
            assert_eq!(derive_status(&cpu(v), &t), HealthStatus::Critical, "cpu {v}");
        }
        for v in [75.1, 80.0, 90.0] {
            assert_eq!(derive_status(&cpu(v), &t), HealthStatus::Warning, "cpu {v}");
        }
        for v in [0.0, 50.0, 75.0] {
            assert_eq!(derive_status(&cpu(v), &t), HealthStatus::Healthy, "cpu {v}");
        }
    }

    #[test]
    fn test_worst_metric_wins() {
        let t = HealthThresholds::default();
        let metrics = HealthMetrics {
            cpu_usage: Some(80.0),
            disk_usage: Some(96.0),
            ..Default::default()
        };
        assert_eq!(derive_status(&metrics, &t), HealthStatus::Critical);

        let metrics = HealthMetrics {
            memory_usage: Some(85.0),
            ..Default::default()
        };
        assert_eq!(derive_status(&metrics, &t), HealthStatus::Warning);
    }

    #[test]
    fn test_empty_metrics_are_healthy() {
        let t = HealthThresholds::default();
        assert_eq!(derive_status(&HealthMetrics::default(), &t), HealthStatus::Healthy);
    }

    #[test]
    fn test_memory_from_raw_numbers() {
        let t = HealthThresholds::default();
        let metrics = HealthMetrics {
            memory_total: Some(1000),
            memory_used: Some(950),
            ..Default::default()
        };
        assert_eq!(metrics.effective_memory_usage(), Some(95.0));
        assert_eq!(derive_status(&metrics, &t), HealthStatus::Critical);

        let metrics = HealthMetrics {
            disk_total: Some(0),
            disk_used: Some(10),
            ..Default::default()
        };
        assert_eq!(metrics.effective_disk_usage(), None);
    }

    #[test]
    fn test_payload_field_names() {
        let metrics: HealthMetrics = serde_json::from_str(
            r#"{"cpuUsage": 12.5, "ffmpegProcesses": 3, "activeStreams": 9, "lastError": "disk"}"#,
        )
        .unwrap();
        assert_eq!(metrics.cpu_usage, Some(12.5));
        assert_eq!(metrics.ffmpeg_process_count, Some(3));
        assert_eq!(metrics.active_streams, Some(9));
        assert_eq!(metrics.last_error.as_deref(), Some("disk"));
        assert_eq!(metrics.memory_usage, None);
    }
}
