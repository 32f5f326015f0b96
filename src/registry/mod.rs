//! Server registry.
//!
//! # Responsibilities
//! - Own the catalog of media servers (sharded concurrent map)
//! - Own `status` and `current_clients` for each server
//! - Serve the selection hot path (`list_healthy`) without touching history
//! - Hand out failover claims so one offline transition yields one event

pub mod server;

use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::error::{FleetError, FleetResult};
use crate::health::HealthStatus;
use crate::observability::metrics;

pub use server::{
    LiveMetrics, Reachability, Server, ServerId, ServerProfile, ServerSnapshot, ServerStatus,
};

/// Catalog of servers and their live counters.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: DashMap<ServerId, Arc<Server>>,
}

impl ServerRegistry {
    /// Create a registry seeded from configuration.
    pub fn new(configs: &[ServerConfig]) -> Self {
        let registry = Self::default();
        for config in configs {
            registry.upsert(config);
        }
        registry
    }

    /// Insert a server or update its catalog fields in place.
    /// Live counters survive an update.
    pub fn upsert(&self, config: &ServerConfig) -> ServerSnapshot {
        let server = match self.get(config.id) {
            Some(existing) => {
                existing.set_profile(ServerProfile::from(config));
                existing.set_enabled(config.enabled);
                tracing::info!(server_id = config.id, "Server catalog entry updated");
                existing
            }
            None => {
                let server = self
                    .servers
                    .entry(config.id)
                    .or_insert_with(|| Arc::new(Server::new(config)))
                    .clone();
                tracing::info!(server_id = config.id, name = %config.name, "Server registered");
                server
            }
        };
        server.snapshot()
    }

    /// Remove a server from the catalog.
    pub fn remove(&self, id: ServerId) -> FleetResult<ServerSnapshot> {
        let (_, server) = self
            .servers
            .remove(&id)
            .ok_or(FleetError::server_not_found(id))?;
        tracing::info!(server_id = id, "Server removed from catalog");
        Ok(server.snapshot())
    }

    pub fn get(&self, id: ServerId) -> Option<Arc<Server>> {
        self.servers.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: ServerId) -> bool {
        self.servers.contains_key(&id)
    }

    pub fn snapshot(&self, id: ServerId) -> Option<ServerSnapshot> {
        self.get(id).map(|s| s.snapshot())
    }

    /// All servers, sorted by id.
    pub fn list(&self) -> Vec<ServerSnapshot> {
        let mut all: Vec<_> = self.servers.iter().map(|r| r.value().snapshot()).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    /// Online servers, sorted by id. With `exclude_disabled` only enabled ones.
    pub fn list_healthy(&self, exclude_disabled: bool) -> Vec<ServerSnapshot> {
        let mut healthy: Vec<_> = self
            .servers
            .iter()
            .filter(|r| {
                let s = r.value();
                s.status() == ServerStatus::Online && (!exclude_disabled || s.is_enabled())
            })
            .map(|r| r.value().snapshot())
            .collect();
        healthy.sort_by_key(|s| s.id);
        healthy
    }

    /// Handles the server list for background work without snapshotting.
    pub fn all_servers(&self) -> Vec<Arc<Server>> {
        self.servers.iter().map(|r| r.value().clone()).collect()
    }

    /// Atomically apply a connection delta. Returns the new count.
    pub fn increment_client_count(&self, id: ServerId, delta: i64) -> FleetResult<u64> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        let count = server.add_clients(delta);
        metrics::record_client_count(id, count);
        Ok(count)
    }

    pub fn set_enabled(&self, id: ServerId, enabled: bool) -> FleetResult<ServerSnapshot> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        server.set_enabled(enabled);
        tracing::info!(server_id = id, enabled, "Server admin toggle changed");
        Ok(server.snapshot())
    }

    /// Returns true if the server transitioned.
    pub fn mark_offline(&self, id: ServerId) -> FleetResult<bool> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        let changed = server.mark_offline();
        if changed {
            tracing::info!(server_id = id, "Server marked offline");
        }
        Ok(changed)
    }

    /// Returns true if the server transitioned.
    pub fn mark_online(&self, id: ServerId) -> FleetResult<bool> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        let changed = server.mark_online();
        if changed {
            tracing::info!(server_id = id, "Server marked online");
        }
        Ok(changed)
    }

    /// Project a freshly derived health status onto the registry.
    pub fn apply_health(
        &self,
        id: ServerId,
        status: HealthStatus,
        live: LiveMetrics,
    ) -> FleetResult<ServerStatus> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        let before = server.status();
        let after = server.apply_health(status, live);
        if before != after {
            tracing::info!(server_id = id, from = ?before, to = ?after, health = ?status, "Server status projected from health");
        }
        Ok(after)
    }

    /// Claim the failover of an online server.
    /// The claim is released when the returned guard is dropped.
    pub fn claim_failover(&self, id: ServerId) -> FleetResult<FailoverClaim> {
        let server = self.get(id).ok_or(FleetError::server_not_found(id))?;
        if !server.try_claim_failover() {
            return Err(FleetError::AlreadyOffline(id));
        }
        Ok(FailoverClaim { server })
    }
}

/// A RAII guard that holds the failover claim on one server.
#[derive(Debug)]
pub struct FailoverClaim {
    server: Arc<Server>,
}

impl Deref for FailoverClaim {
    type Target = Server;
    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for FailoverClaim {
    fn drop(&mut self) {
        self.server.release_failover();
    }
}
