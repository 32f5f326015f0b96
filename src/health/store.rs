//! Health sample store.
//!
//! Append-only per-server time series. Only the newest sample matters on the
//! read path; history is kept for trend queries and bounded by count and age.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::unix_millis;
use crate::config::HealthConfig;
use crate::error::{FleetError, FleetResult};
use crate::health::sample::{derive_status, HealthMetrics, HealthSample, HealthStatus};
use crate::observability::metrics;
use crate::registry::{ServerId, ServerRegistry};

pub struct HealthStore {
    samples: DashMap<ServerId, VecDeque<HealthSample>>,
    registry: Arc<ServerRegistry>,
    config: HealthConfig,
}

impl HealthStore {
    pub fn new(registry: Arc<ServerRegistry>, config: HealthConfig) -> Self {
        Self {
            samples: DashMap::new(),
            registry,
            config,
        }
    }

    /// Record a metric push, derive its status and project it onto the registry.
    pub fn record_health(&self, server_id: ServerId, metrics: HealthMetrics) -> FleetResult<HealthSample> {
        if !self.registry.contains(server_id) {
            tracing::warn!(server_id, "Health report for unknown server rejected");
            return Err(FleetError::server_not_found(server_id));
        }

        let status = derive_status(&metrics, &self.config.thresholds);
        // Projection runs under the series guard so the registry always
        // reflects the newest stored sample.
        let mut series = self.samples.entry(server_id).or_default();
        // Keep timestamps non-decreasing so history stays ordered.
        let floor = series.back().map(|s| s.timestamp).unwrap_or(0);
        let sample = HealthSample {
            server_id,
            timestamp: unix_millis().max(floor),
            metrics,
            status,
        };

        let projected = match self
            .registry
            .apply_health(server_id, status, sample.metrics.live(sample.timestamp))
        {
            Ok(projected) => projected,
            Err(e) => {
                // Removed after the check above; do not leave an orphan series.
                drop(series);
                self.samples.remove_if(&server_id, |_, s| s.is_empty());
                tracing::warn!(server_id, error = %e, "Health report for removed server rejected");
                return Err(e);
            }
        };

        series.push_back(sample.clone());
        while series.len() > self.config.max_samples_per_server {
            series.pop_front();
        }
        drop(series);

        metrics::record_health_report(server_id, status);
        tracing::debug!(server_id, status = status.as_str(), projected = ?projected, "Health sample recorded");
        Ok(sample)
    }

    pub fn latest(&self, server_id: ServerId) -> Option<HealthSample> {
        self.samples
            .get(&server_id)
            .and_then(|series| series.back().cloned())
    }

    /// Status of the newest sample; `Offline` when the server never reported.
    pub fn latest_status(&self, server_id: ServerId) -> HealthStatus {
        self.samples
            .get(&server_id)
            .and_then(|series| series.back().map(|s| s.status))
            .unwrap_or(HealthStatus::Offline)
    }

    /// Samples at or after `since` (unix millis), oldest first.
    pub fn history(&self, server_id: ServerId, since: u64) -> Vec<HealthSample> {
        match self.samples.get(&server_id) {
            Some(series) => {
                let start = series.partition_point(|s| s.timestamp < since);
                series.range(start..).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Drop samples older than `cutoff`. The newest sample of each server is always kept.
    pub fn prune_before(&self, cutoff: u64) -> usize {
        let mut pruned = 0;
        for mut series in self.samples.iter_mut() {
            while series.len() > 1 && series.front().is_some_and(|s| s.timestamp < cutoff) {
                series.pop_front();
                pruned += 1;
            }
        }
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired health samples");
        }
        pruned
    }

    /// Apply the configured retention window relative to now.
    pub fn prune_expired(&self) -> usize {
        let window = self.config.retention_secs.saturating_mul(1000);
        self.prune_before(unix_millis().saturating_sub(window))
    }

    /// Forget every sample of a server removed from the catalog.
    pub fn forget(&self, server_id: ServerId) {
        self.samples.remove(&server_id);
    }
}
