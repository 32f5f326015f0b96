//! Control-plane error taxonomy.

use thiserror::Error;

use crate::registry::ServerId;

/// Errors surfaced by the control-plane components.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Selection found no enabled, online server.
    #[error("no healthy servers available")]
    NoHealthyServer,

    /// Unknown server, job, rule or event id.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    /// Missing or out-of-range input on a create/update call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The failover event was written but the registry update did not go through.
    #[error("failover event {event_id} recorded but server {server_id} could not be marked offline: {reason}")]
    InconsistentFailover {
        event_id: u64,
        server_id: ServerId,
        reason: String,
    },

    /// Failover requested for a server that is offline or already failing over.
    #[error("server {0} is already offline or failing over")]
    AlreadyOffline(ServerId),

    /// Sync job transition rejected by the state machine.
    #[error("sync job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: u64,
        from: &'static str,
        to: &'static str,
    },
}

impl FleetError {
    pub fn server_not_found(id: ServerId) -> Self {
        Self::NotFound { kind: "server", id }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
