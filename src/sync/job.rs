//! Sync job record and its state machine.
//!
//! # State Transitions
//! ```text
//! pending → running → completed
//!    │         └──→ failed
//!    └──→ failed (cancelled before start)
//! ```
//! Terminal states accept no further update.

use serde::{Deserialize, Serialize};

use crate::registry::ServerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncJobType {
    Streams,
    Lines,
    Settings,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }

    /// Staying in the same non-terminal state is allowed (progress-only updates).
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Running)
                | (Pending, Failed)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: u64,
    pub job_type: SyncJobType,
    pub source_server_id: Option<ServerId>,
    pub target_server_id: ServerId,
    pub status: SyncStatus,
    pub progress: u8,
    pub items_synced: u64,
    pub items_failed: u64,
    pub error_message: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    pub completed_at: Option<u64>,
}

/// Partial progress report; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncUpdate {
    pub status: Option<SyncStatus>,
    pub progress: Option<u8>,
    pub items_synced: Option<u64>,
    pub items_failed: Option<u64>,
    pub error_message: Option<String>,
}
