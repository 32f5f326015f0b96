//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control plane.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::StrategyKind;

/// Root configuration for the fleet control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admin surface settings.
    pub admin: AdminConfig,

    /// Server selection settings.
    pub balancer: BalancerConfig,

    /// Health sample derivation and retention.
    pub health: HealthConfig,

    /// Background monitor (probing, pruning, automatic failover).
    pub monitor: MonitorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Initial server catalog.
    pub servers: Vec<ServerConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token). Admin routes are open when unset.
    pub api_key: Option<String>,
}

/// Load balancing settings, loaded once at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Strategy used when a request does not name one.
    pub default_strategy: StrategyKind,

    /// Weight for servers without `max_clients`.
    pub default_weight: u64,

    /// Consult load-balancing rules before applying a strategy.
    pub rules_enabled: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::LeastConnections,
            default_weight: 1000,
            rules_enabled: true,
        }
    }
}

/// Percent thresholds used to derive a health status from raw metrics.
/// A metric strictly above its threshold trips that level.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthThresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 75.0,
            cpu_critical: 90.0,
            memory_warning: 80.0,
            memory_critical: 90.0,
            disk_warning: 85.0,
            disk_critical: 95.0,
        }
    }
}

/// Health store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub thresholds: HealthThresholds,

    /// Samples older than this are pruned by the monitor.
    pub retention_secs: u64,

    /// Upper bound on retained samples per server.
    pub max_samples_per_server: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            retention_secs: 24 * 60 * 60,
            max_samples_per_server: 2880,
        }
    }
}

/// Fleet monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the periodic monitor.
    pub enabled: bool,

    /// Tick interval in seconds.
    pub interval_secs: u64,

    /// Fail over critical/offline servers automatically.
    pub auto_failover: bool,

    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Maximum probes in flight during one tick.
    pub probe_concurrency: usize,

    /// Number of consecutive probe failures before marking unreachable.
    pub unhealthy_threshold: u32,

    /// Number of consecutive probe successes before marking reachable.
    pub healthy_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            auto_failover: true,
            probe_timeout_secs: 5,
            probe_concurrency: 16,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Media server catalog entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique server identifier.
    pub id: u64,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Capacity; also the weight for weighted selection.
    #[serde(default)]
    pub max_clients: Option<u64>,

    /// Admin toggle.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Start in rotation before the first health report.
    #[serde(default)]
    pub online: bool,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Status endpoint probed by the monitor (e.g. an nginx stub_status URL).
    #[serde(default)]
    pub status_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ServerConfig {
    /// Minimal entry, mostly useful in tests.
    pub fn new(id: u64, max_clients: Option<u64>) -> Self {
        Self {
            id,
            name: format!("server-{id}"),
            max_clients,
            enabled: true,
            online: false,
            country: None,
            latitude: None,
            longitude: None,
            status_url: None,
        }
    }
}
