//! Sync job tracking.
//!
//! The data transfer itself is done by an external worker; this module only
//! records jobs and the progress that worker reports, and serves them to
//! readers while the job is in flight.

pub mod job;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::unix_millis;
use crate::error::{FleetError, FleetResult};
use crate::observability::metrics;
use crate::registry::{ServerId, ServerRegistry};

pub use job::{SyncJob, SyncJobType, SyncStatus, SyncUpdate};

pub struct SyncJobManager {
    jobs: DashMap<u64, SyncJob>,
    next_id: AtomicU64,
    registry: Arc<ServerRegistry>,
}

impl SyncJobManager {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self {
            jobs: DashMap::new(),
            next_id: AtomicU64::new(0),
            registry,
        }
    }

    /// Register a new pending job. Returns its id.
    pub fn create_job(
        &self,
        job_type: SyncJobType,
        source_server_id: Option<ServerId>,
        target_server_id: ServerId,
    ) -> FleetResult<u64> {
        if source_server_id == Some(target_server_id) {
            return Err(FleetError::Validation(
                "source and target server must differ".into(),
            ));
        }
        for id in source_server_id.into_iter().chain([target_server_id]) {
            if !self.registry.contains(id) {
                return Err(FleetError::server_not_found(id));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = unix_millis();
        self.jobs.insert(
            id,
            SyncJob {
                id,
                job_type,
                source_server_id,
                target_server_id,
                status: SyncStatus::Pending,
                progress: 0,
                items_synced: 0,
                items_failed: 0,
                error_message: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        );

        metrics::record_sync_transition(SyncStatus::Pending);
        tracing::info!(job_id = id, job_type = ?job_type, source = ?source_server_id, target = target_server_id, "Sync job created");
        Ok(id)
    }

    /// Apply a progress report. The whole update is rejected if any part is invalid.
    pub fn update_progress(&self, job_id: u64, update: SyncUpdate) -> FleetResult<SyncJob> {
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(FleetError::NotFound { kind: "sync job", id: job_id })?;

        let next = update.status.unwrap_or(job.status);
        if !job.status.can_transition_to(next) {
            tracing::warn!(job_id, from = job.status.as_str(), to = next.as_str(), "Sync transition rejected");
            return Err(FleetError::InvalidTransition {
                job_id,
                from: job.status.as_str(),
                to: next.as_str(),
            });
        }
        if let Some(progress) = update.progress {
            if progress > 100 {
                return Err(FleetError::Validation(format!(
                    "progress must be within 0..=100, got {progress}"
                )));
            }
            job.progress = progress;
        }

        if let Some(synced) = update.items_synced {
            job.items_synced = synced;
        }
        if let Some(failed) = update.items_failed {
            job.items_failed = failed;
        }
        if let Some(message) = update.error_message {
            job.error_message = Some(message);
        }

        let now = unix_millis();
        job.updated_at = now;
        if next != job.status {
            tracing::info!(job_id, from = job.status.as_str(), to = next.as_str(), "Sync job transitioned");
            metrics::record_sync_transition(next);
            job.status = next;
        }
        if next == SyncStatus::Completed {
            job.progress = 100;
        }
        if next.is_terminal() {
            job.completed_at = Some(now);
        }

        Ok(job.clone())
    }

    /// Stop a job that has not finished; it ends as `failed` with an explicit message.
    pub fn cancel(&self, job_id: u64) -> FleetResult<SyncJob> {
        self.update_progress(
            job_id,
            SyncUpdate {
                status: Some(SyncStatus::Failed),
                error_message: Some("cancelled".into()),
                ..Default::default()
            },
        )
    }

    pub fn get(&self, job_id: u64) -> FleetResult<SyncJob> {
        self.jobs
            .get(&job_id)
            .map(|r| r.value().clone())
            .ok_or(FleetError::NotFound { kind: "sync job", id: job_id })
    }

    /// Newest first.
    pub fn list(&self) -> Vec<SyncJob> {
        let mut jobs: Vec<_> = self.jobs.iter().map(|r| r.value().clone()).collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        jobs
    }
}
