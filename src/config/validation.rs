//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics and collects every
//! problem instead of stopping at the first one.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{FleetConfig, HealthThresholds, ServerConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.balancer.default_weight == 0 {
        errors.push(ValidationError::new("balancer.default_weight", "must be greater than 0"));
    }

    validate_thresholds(&config.health.thresholds, &mut errors);

    if config.health.max_samples_per_server == 0 {
        errors.push(ValidationError::new("health.max_samples_per_server", "must be greater than 0"));
    }

    let monitor = &config.monitor;
    if monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be greater than 0"));
    }
    if monitor.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("monitor.probe_timeout_secs", "must be greater than 0"));
    }
    if monitor.probe_concurrency == 0 {
        errors.push(ValidationError::new("monitor.probe_concurrency", "must be greater than 0"));
    }
    if monitor.unhealthy_threshold == 0 || monitor.healthy_threshold == 0 {
        errors.push(ValidationError::new("monitor", "probe thresholds must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for (i, server) in config.servers.iter().enumerate() {
        if !seen.insert(server.id) {
            errors.push(ValidationError::new(
                format!("servers[{i}].id"),
                format!("duplicate server id {}", server.id),
            ));
        }
        errors.extend(validate_server(server).into_iter().map(|mut e| {
            e.field = format!("servers[{i}]{}", e.field);
            e
        }));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks for one catalog entry; field names are relative (`""`, `".statusUrl"`).
pub fn validate_server(server: &ServerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if server.latitude.is_some() != server.longitude.is_some() {
        errors.push(ValidationError::new("", "latitude and longitude must be set together"));
    }
    if let Some(url) = &server.status_url {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::new(
                ".statusUrl",
                format!("'{url}' is not a valid URL"),
            ));
        }
    }
    errors
}

fn validate_thresholds(t: &HealthThresholds, errors: &mut Vec<ValidationError>) {
    let pairs = [
        ("cpu", t.cpu_warning, t.cpu_critical),
        ("memory", t.memory_warning, t.memory_critical),
        ("disk", t.disk_warning, t.disk_critical),
    ];
    for (name, warning, critical) in pairs {
        if warning >= critical {
            errors.push(ValidationError::new(
                format!("health.thresholds.{name}"),
                format!("warning ({warning}) must be below critical ({critical})"),
            ));
        }
    }
}
