//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fleet_selections_total` (counter): selections by strategy, outcome
//! - `fleet_health_reports_total` (counter): reports by derived status
//! - `fleet_server_health` (gauge): per server, 0=healthy .. 3=offline
//! - `fleet_server_clients` (gauge): per server live client count
//! - `fleet_probes_total` (counter): probes by outcome
//! - `fleet_failovers_total` (counter): failovers by trigger, status
//! - `fleet_sync_transitions_total` (counter): sync job transitions by status
//! - `fleet_http_requests_total` / `fleet_http_request_duration_seconds`
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::failover::{FailoverStatus, TriggeredBy};
use crate::health::HealthStatus;
use crate::load_balancer::StrategyKind;
use crate::registry::ServerId;
use crate::sync::SyncStatus;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_selection(strategy: StrategyKind, found: bool) {
    let outcome = if found { "selected" } else { "no_healthy_server" };
    counter!("fleet_selections_total", "strategy" => strategy.as_str(), "outcome" => outcome)
        .increment(1);
}

pub fn record_health_report(server_id: ServerId, status: HealthStatus) {
    counter!("fleet_health_reports_total", "status" => status.as_str()).increment(1);
    gauge!("fleet_server_health", "server" => server_id.to_string()).set(status as u8 as f64);
}

pub fn record_client_count(server_id: ServerId, count: u64) {
    gauge!("fleet_server_clients", "server" => server_id.to_string()).set(count as f64);
}

pub fn record_probe(server_id: ServerId, up: bool) {
    let outcome = if up { "up" } else { "down" };
    counter!("fleet_probes_total", "server" => server_id.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_failover(triggered_by: TriggeredBy, status: FailoverStatus) {
    counter!(
        "fleet_failovers_total",
        "triggered_by" => triggered_by.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

pub fn record_sync_transition(status: SyncStatus) {
    counter!("fleet_sync_transitions_total", "status" => status.as_str()).increment(1);
}

pub fn record_request(method: &str, path: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("fleet_http_requests_total", &labels).increment(1);
    histogram!("fleet_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
