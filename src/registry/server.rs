//! Server record.
//!
//! # Responsibilities
//! - Represent a single media server in the catalog
//! - Track live client count (atomic, never below zero)
//! - Hold the registry-level status and the failover claim
//! - Track probe reachability with hysteresis

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::health::HealthStatus;

pub type ServerId = u64;

const ONLINE: u8 = 0b01;
const HELD: u8 = 0b10;

fn status_of(state: u8) -> ServerStatus {
    if state & ONLINE != 0 {
        ServerStatus::Online
    } else {
        ServerStatus::Offline
    }
}

/// Next state for a health sample; pure so it can run inside a CAS loop.
fn project(state: u8, health: HealthStatus, unreachable: bool) -> u8 {
    let held = state & HELD;
    match health {
        HealthStatus::Offline => held,
        HealthStatus::Healthy if held != 0 && unreachable => HELD,
        HealthStatus::Healthy => ONLINE,
        _ if held != 0 => HELD,
        _ => ONLINE,
    }
}

/// Registry-level status: traffic-eligible or not.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Offline = 0,
    Online = 1,
}

impl From<u8> for ServerStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ServerStatus::Online,
            _ => ServerStatus::Offline,
        }
    }
}

/// Outcome of active probing.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Unknown = 0,
    Reachable = 1,
    Unreachable = 2,
}

impl From<u8> for Reachability {
    fn from(val: u8) -> Self {
        match val {
            1 => Reachability::Reachable,
            2 => Reachability::Unreachable,
            _ => Reachability::Unknown,
        }
    }
}

/// Catalog fields that only change through the admin surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerProfile {
    pub name: String,
    pub max_clients: Option<u64>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status_url: Option<String>,
}

impl From<&ServerConfig> for ServerProfile {
    fn from(config: &ServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_clients: config.max_clients,
            country: config.country.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            status_url: config.status_url.clone(),
        }
    }
}

/// Latest metrics denormalized from the newest health sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveMetrics {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub bandwidth: Option<f64>,
    pub last_checked: Option<u64>,
}

/// A single media server.
#[derive(Debug)]
pub struct Server {
    pub id: ServerId,
    profile: ArcSwap<ServerProfile>,
    live: ArcSwap<LiveMetrics>,

    current_clients: AtomicU64,
    enabled: AtomicBool,
    /// `ONLINE` and `HELD` bits, updated together so a projection never
    /// overwrites a concurrent `mark_offline`.
    state: AtomicU8,
    failover_claimed: AtomicBool,

    reachability: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl Server {
    /// Create a server from its catalog entry.
    pub fn new(config: &ServerConfig) -> Self {
        let state = if config.online { ONLINE } else { 0 };
        Self {
            id: config.id,
            profile: ArcSwap::from_pointee(ServerProfile::from(config)),
            live: ArcSwap::from_pointee(LiveMetrics::default()),
            current_clients: AtomicU64::new(0),
            enabled: AtomicBool::new(config.enabled),
            state: AtomicU8::new(state),
            failover_claimed: AtomicBool::new(false),
            reachability: AtomicU8::new(Reachability::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    pub fn profile(&self) -> Arc<ServerProfile> {
        self.profile.load_full()
    }

    pub fn set_profile(&self, profile: ServerProfile) {
        self.profile.store(Arc::new(profile));
    }

    pub fn current_clients(&self) -> u64 {
        self.current_clients.load(Ordering::Acquire)
    }

    /// Apply a connect/disconnect delta, saturating at zero. Returns the new count.
    pub fn add_clients(&self, delta: i64) -> u64 {
        if delta >= 0 {
            return self.current_clients.fetch_add(delta as u64, Ordering::AcqRel) + delta as u64;
        }
        let dec = delta.unsigned_abs();
        let prev = self
            .current_clients
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(dec)))
            .unwrap_or_else(|c| c);
        prev.saturating_sub(dec)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn status(&self) -> ServerStatus {
        status_of(self.state.load(Ordering::Acquire))
    }

    /// Whether `mark_offline` is still holding the server out of rotation.
    pub fn is_held_offline(&self) -> bool {
        self.state.load(Ordering::Acquire) & HELD != 0
    }

    /// Take the server out of rotation and hold it there. Returns true if it was online.
    pub fn mark_offline(&self) -> bool {
        let prev = self.state.swap(HELD, Ordering::AcqRel);
        status_of(prev) == ServerStatus::Online
    }

    /// Put the server back into rotation and lift any hold. Returns true if it was offline.
    pub fn mark_online(&self) -> bool {
        let prev = self.state.swap(ONLINE, Ordering::AcqRel);
        status_of(prev) == ServerStatus::Offline
    }

    /// Project a derived health status onto the registry status.
    ///
    /// `offline` maps to offline, everything else to online, except that a
    /// held server only returns on a `healthy` sample, and not while its
    /// status endpoint is unreachable.
    pub fn apply_health(&self, status: HealthStatus, live: LiveMetrics) -> ServerStatus {
        self.live.store(Arc::new(live));
        let unreachable = self.reachability() == Reachability::Unreachable;
        let prev = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                Some(project(state, status, unreachable))
            })
            .unwrap_or_else(|s| s);
        status_of(project(prev, status, unreachable))
    }

    pub fn live(&self) -> Arc<LiveMetrics> {
        self.live.load_full()
    }

    // --- Failover claim ---

    /// Claim the right to fail this server over. Only succeeds while online and unclaimed.
    pub(crate) fn try_claim_failover(&self) -> bool {
        if self.status() != ServerStatus::Online {
            return false;
        }
        if self
            .failover_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Lost a race with another path taking the server offline.
        if self.status() != ServerStatus::Online {
            self.release_failover();
            return false;
        }
        true
    }

    pub(crate) fn release_failover(&self) {
        self.failover_claimed.store(false, Ordering::Release);
    }

    // --- Probe logic ---

    pub fn reachability(&self) -> Reachability {
        Reachability::from(self.reachability.load(Ordering::Relaxed))
    }

    /// Report a successful probe. Returns true on a transition to reachable.
    pub fn mark_probe_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.reachability() == Reachability::Reachable {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.reachability
                .store(Reachability::Reachable as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Report a failed probe. Returns true on a transition to unreachable.
    pub fn mark_probe_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.reachability() == Reachability::Unreachable {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.reachability
                .store(Reachability::Unreachable as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Point-in-time view used by selection and the API.
    pub fn snapshot(&self) -> ServerSnapshot {
        let profile = self.profile();
        let live = self.live();
        ServerSnapshot {
            id: self.id,
            name: profile.name.clone(),
            max_clients: profile.max_clients,
            current_clients: self.current_clients(),
            enabled: self.is_enabled(),
            status: self.status(),
            country: profile.country.clone(),
            latitude: profile.latitude,
            longitude: profile.longitude,
            cpu_usage: live.cpu_usage,
            memory_usage: live.memory_usage,
            bandwidth: live.bandwidth,
            last_checked: live.last_checked,
            reachability: self.reachability(),
        }
    }
}

/// Immutable copy of a server's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub id: ServerId,
    pub name: String,
    pub max_clients: Option<u64>,
    pub current_clients: u64,
    pub enabled: bool,
    pub status: ServerStatus,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub bandwidth: Option<f64>,
    pub last_checked: Option<u64>,
    pub reachability: Reachability,
}

impl ServerSnapshot {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_count_saturates_at_zero() {
        let server = Server::new(&ServerConfig::new(1, None));
        assert_eq!(server.add_clients(3), 3);
        assert_eq!(server.add_clients(-2), 1);
        assert_eq!(server.add_clients(-5), 0);
        assert_eq!(server.current_clients(), 0);
    }

    #[test]
    fn test_held_offline_until_healthy() {
        let mut config = ServerConfig::new(1, None);
        config.online = true;
        let server = Server::new(&config);

        assert!(server.mark_offline());
        assert!(!server.mark_offline());

        let status = server.apply_health(HealthStatus::Critical, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Offline);
        let status = server.apply_health(HealthStatus::Warning, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Offline);
        let status = server.apply_health(HealthStatus::Healthy, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Online);
        let status = server.apply_health(HealthStatus::Warning, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Online);
    }

    #[test]
    fn test_unreachable_hold_survives_healthy_sample() {
        let mut config = ServerConfig::new(1, None);
        config.online = true;
        let server = Server::new(&config);
        server.mark_probe_failure(1);
        server.mark_offline();

        let status = server.apply_health(HealthStatus::Healthy, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Offline);
        assert!(server.is_held_offline());

        server.mark_probe_success(1);
        let status = server.apply_health(HealthStatus::Healthy, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Online);
        assert!(!server.is_held_offline());
    }

    #[test]
    fn test_projection_never_overrides_mark_offline() {
        let mut config = ServerConfig::new(1, None);
        config.online = true;

        for _ in 0..500 {
            let server = Server::new(&config);
            std::thread::scope(|s| {
                s.spawn(|| {
                    for _ in 0..4 {
                        server.apply_health(HealthStatus::Critical, LiveMetrics::default());
                    }
                });
                s.spawn(|| server.mark_offline());
            });
            assert_eq!(server.status(), ServerStatus::Offline);
        }
    }

    #[test]
    fn test_first_report_brings_server_online() {
        let server = Server::new(&ServerConfig::new(1, None));
        assert_eq!(server.status(), ServerStatus::Offline);
        let status = server.apply_health(HealthStatus::Warning, LiveMetrics::default());
        assert_eq!(status, ServerStatus::Online);
    }

    #[test]
    fn test_failover_claim_is_exclusive() {
        let mut config = ServerConfig::new(1, None);
        config.online = true;
        let server = Server::new(&config);

        assert!(server.try_claim_failover());
        assert!(!server.try_claim_failover());
        server.release_failover();
        assert!(server.try_claim_failover());
        server.release_failover();

        server.mark_offline();
        assert!(!server.try_claim_failover());
    }

    #[test]
    fn test_probe_hysteresis() {
        let server = Server::new(&ServerConfig::new(1, None));

        assert!(!server.mark_probe_failure(2));
        assert!(server.mark_probe_failure(2));
        assert_eq!(server.reachability(), Reachability::Unreachable);

        assert!(!server.mark_probe_success(2));
        assert!(!server.mark_probe_failure(2));
        assert!(!server.mark_probe_success(2));
        assert!(server.mark_probe_success(2));
        assert_eq!(server.reachability(), Reachability::Reachable);
    }
}
