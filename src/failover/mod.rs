//! Failover coordination.
//!
//! # State machine (per server, derived)
//! ```text
//! Healthy → Degraded (warning/critical) → Failed-over (offline, event recorded)
//!     ↑                                          │
//!     └──────── healthy sample / mark online ────┘
//! ```
//!
//! # Trigger sequence
//! ```text
//! claim (CAS on the server, must be online and unclaimed)
//!     → snapshot affected connections/streams
//!     → append event (pending)
//!     → registry.mark_offline
//!     → settle event: completed, or failed + InconsistentFailover
//! ```

pub mod event;
pub mod monitor;

use std::sync::Arc;

use crate::clock::unix_millis;
use crate::error::{FleetError, FleetResult};
use crate::health::{HealthStatus, HealthStore};
use crate::load_balancer::{LoadBalancer, SelectionHints, StrategyKind};
use crate::observability::metrics;
use crate::registry::{Reachability, ServerId, ServerRegistry, ServerStatus};

pub use event::{FailoverEvent, FailoverLog, FailoverStatus, TriggeredBy};
pub use monitor::FleetMonitor;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Parameters of one failover.
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverRequest {
    pub from_server_id: ServerId,
    pub to_server_id: ServerId,
    pub reason: Option<String>,
    pub triggered_by: TriggeredBy,
    pub user_id: Option<String>,
}

pub struct FailoverCoordinator {
    registry: Arc<ServerRegistry>,
    health: Arc<HealthStore>,
    balancer: Arc<LoadBalancer>,
    log: FailoverLog,
}

impl FailoverCoordinator {
    pub fn new(
        registry: Arc<ServerRegistry>,
        health: Arc<HealthStore>,
        balancer: Arc<LoadBalancer>,
    ) -> Self {
        Self {
            registry,
            health,
            balancer,
            log: FailoverLog::new(),
        }
    }

    /// Move traffic off `from_server_id` and record why.
    pub fn trigger_failover(&self, request: FailoverRequest) -> FleetResult<FailoverEvent> {
        let from = request.from_server_id;
        if from == request.to_server_id {
            return Err(FleetError::Validation(
                "cannot fail a server over to itself".into(),
            ));
        }
        if !self.registry.contains(request.to_server_id) {
            return Err(FleetError::server_not_found(request.to_server_id));
        }

        let claim = self.registry.claim_failover(from).inspect_err(|e| {
            tracing::debug!(server_id = from, error = %e, "Failover not started");
        })?;

        let affected_connections = claim.current_clients();
        let affected_streams = self
            .health
            .latest(from)
            .and_then(|s| s.metrics.active_streams)
            .unwrap_or(0) as u64;

        let reason = request.reason.unwrap_or_else(|| match request.triggered_by {
            TriggeredBy::System => "automatic failover".to_string(),
            TriggeredBy::Admin => "manual failover".to_string(),
        });

        let event = self.log.append(FailoverEvent {
            id: 0,
            from_server_id: from,
            to_server_id: request.to_server_id,
            reason,
            triggered_by: request.triggered_by,
            user_id: request.user_id,
            affected_connections,
            affected_streams,
            status: FailoverStatus::Pending,
            created_at: unix_millis(),
        });

        let outcome = self.registry.mark_offline(from);
        drop(claim);
        self.settle(event, outcome)
    }

    /// Finish the event according to the registry outcome.
    fn settle(&self, event: FailoverEvent, outcome: FleetResult<bool>) -> FleetResult<FailoverEvent> {
        match outcome {
            Ok(_) => {
                let event = self.log.set_status(event.id, FailoverStatus::Completed)?;
                metrics::record_failover(event.triggered_by, FailoverStatus::Completed);
                tracing::info!(
                    event_id = event.id,
                    from = event.from_server_id,
                    to = event.to_server_id,
                    triggered_by = event.triggered_by.as_str(),
                    affected_connections = event.affected_connections,
                    reason = %event.reason,
                    "Failover completed"
                );
                Ok(event)
            }
            Err(e) => {
                self.log.set_status(event.id, FailoverStatus::Failed)?;
                metrics::record_failover(event.triggered_by, FailoverStatus::Failed);
                tracing::error!(
                    event_id = event.id,
                    from = event.from_server_id,
                    error = %e,
                    "Failover event recorded but registry update failed"
                );
                Err(FleetError::InconsistentFailover {
                    event_id: event.id,
                    server_id: event.from_server_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Operator request to take a server out of rotation. Traffic moves to the
    /// least loaded other server; with none available the request is refused.
    pub fn take_offline(
        &self,
        server_id: ServerId,
        reason: Option<String>,
        user_id: Option<String>,
    ) -> FleetResult<FailoverEvent> {
        let server = self
            .registry
            .snapshot(server_id)
            .ok_or(FleetError::server_not_found(server_id))?;
        if server.status != ServerStatus::Online {
            return Err(FleetError::AlreadyOffline(server_id));
        }

        let target = self.balancer.select_excluding(
            StrategyKind::LeastConnections,
            &SelectionHints::default(),
            server_id,
        )?;
        self.trigger_failover(FailoverRequest {
            from_server_id: server_id,
            to_server_id: target,
            reason,
            triggered_by: TriggeredBy::Admin,
            user_id,
        })
    }

    /// One automatic pass over the fleet. Returns the events it recorded.
    pub fn check_fleet(&self) -> Vec<FailoverEvent> {
        let mut events = Vec::new();

        for server in self.registry.list() {
            // Offline servers are skipped so repeated checks stay no-ops.
            if !server.enabled || server.status != ServerStatus::Online {
                continue;
            }

            let health = if server.reachability == Reachability::Unreachable {
                HealthStatus::Offline
            } else {
                self.health.latest_status(server.id)
            };
            if !health.needs_failover() {
                continue;
            }

            let target = match self.balancer.select_excluding(
                StrategyKind::LeastConnections,
                &SelectionHints::default(),
                server.id,
            ) {
                Ok(id) => id,
                Err(FleetError::NoHealthyServer) => {
                    tracing::warn!(server_id = server.id, health = health.as_str(), "No failover target, leaving server in rotation");
                    continue;
                }
                Err(e) => {
                    tracing::error!(server_id = server.id, error = %e, "Failover target selection failed");
                    continue;
                }
            };

            let request = FailoverRequest {
                from_server_id: server.id,
                to_server_id: target,
                reason: Some(format!("server health {}", health.as_str())),
                triggered_by: TriggeredBy::System,
                user_id: None,
            };
            match self.trigger_failover(request) {
                Ok(event) => events.push(event),
                Err(FleetError::AlreadyOffline(id)) => {
                    tracing::debug!(server_id = id, "Server already failed over by another caller");
                }
                Err(e) => tracing::error!(server_id = server.id, error = %e, "Automatic failover failed"),
            }
        }

        events
    }

    /// Newest first; `limit` defaults to 50 and is capped at 500.
    pub fn history(&self, limit: Option<usize>) -> Vec<FailoverEvent> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        self.log.recent(limit)
    }

    pub fn event_count(&self) -> usize {
        self.log.len()
    }
}
