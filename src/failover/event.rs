//! Failover audit records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::registry::ServerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    System,
    Admin,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::System => "system",
            TriggeredBy::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverStatus {
    Pending,
    Completed,
    Failed,
}

impl FailoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverStatus::Pending => "pending",
            FailoverStatus::Completed => "completed",
            FailoverStatus::Failed => "failed",
        }
    }
}

/// Write-once record of one offline transition; only `status` changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverEvent {
    pub id: u64,
    pub from_server_id: ServerId,
    pub to_server_id: ServerId,
    pub reason: String,
    pub triggered_by: TriggeredBy,
    pub user_id: Option<String>,
    pub affected_connections: u64,
    pub affected_streams: u64,
    pub status: FailoverStatus,
    pub created_at: u64,
}

/// Append-only event log.
#[derive(Debug, Default)]
pub struct FailoverLog {
    events: RwLock<Vec<FailoverEvent>>,
    next_id: AtomicU64,
}

impl FailoverLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the id and stores the event.
    pub fn append(&self, mut event: FailoverEvent) -> FailoverEvent {
        event.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.events
            .write()
            .expect("failover log lock poisoned")
            .push(event.clone());
        event
    }

    pub fn set_status(&self, id: u64, status: FailoverStatus) -> FleetResult<FailoverEvent> {
        let mut events = self.events.write().expect("failover log lock poisoned");
        let event = events
            .iter_mut()
            .rev()
            .find(|e| e.id == id)
            .ok_or(FleetError::NotFound { kind: "failover event", id })?;
        event.status = status;
        Ok(event.clone())
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<FailoverEvent> {
        self.events
            .read()
            .expect("failover log lock poisoned")
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().expect("failover log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
