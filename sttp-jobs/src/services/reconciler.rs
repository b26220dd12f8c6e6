//! Reconciliation phase
//!
//! Brings `server_status` of delivered, still-polled jobs in line with the
//! remote service. One remote list snapshot per pass, joined in memory on
//! the task id. Only `server_status` is ever written here.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{JobFilter, JobStore};
use crate::error::JobError;
use crate::models::{map_remote_status, JobRecord, RemoteStatus, ServerStatus};
use crate::services::transcription_client::{RemoteJob, TranscriptionService};

/// Totals of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Local jobs selected for polling
    pub examined: usize,
    /// Jobs whose status was written
    pub updated: usize,
    /// Remote status maps to the stored one, or would move backwards
    pub unchanged: usize,
    /// No remote job with this id in the snapshot
    pub unmatched: usize,
    /// Remote status string outside the mapping table
    pub unmapped: usize,
    /// Store write failed; retried next pass
    pub failed: usize,
    /// The remote list could not be fetched; nothing was compared
    pub snapshot_failed: bool,
}

/// Result of refreshing a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(ServerStatus),
    Unchanged(ServerStatus),
    Unmapped(String),
    /// Job is FAILED or already left PENDING/RUNNING
    NotPolled(ServerStatus),
}

pub struct Reconciler {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn JobStore>,
}

enum Applied {
    Updated(ServerStatus),
    Unchanged,
    Unmapped,
}

impl Reconciler {
    pub fn new(service: Arc<dyn TranscriptionService>, store: Arc<dyn JobStore>) -> Self {
        Self { service, store }
    }

    /// Run one reconciliation pass
    ///
    /// Errors only if the local selection cannot be read. Remote and
    /// per-record failures are counted in the report and left for the next pass.
    pub async fn reconcile(&self) -> Result<ReconcileReport, JobError> {
        let pending = self.store.find(&JobFilter::awaiting_server()).await?;
        let mut report = ReconcileReport {
            examined: pending.len(),
            ..ReconcileReport::default()
        };

        if pending.is_empty() {
            debug!("No jobs awaiting server status");
            return Ok(report);
        }

        let snapshot = match self.service.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(
                    pending = pending.len(),
                    classification = e.classification(),
                    error = %e,
                    "Remote job list unavailable, reconciliation deferred"
                );
                report.snapshot_failed = true;
                return Ok(report);
            }
        };

        let remote: HashMap<&str, &RemoteJob> =
            snapshot.iter().map(|job| (job.id.as_str(), job)).collect();

        for record in &pending {
            let Some(task_id) = record.task_id.as_deref() else {
                continue;
            };

            let Some(job) = remote.get(task_id) else {
                debug!(task_id = %task_id, "Job not in remote listing");
                report.unmatched += 1;
                continue;
            };

            match self.apply(record, task_id, &job.status).await {
                Ok(Applied::Updated(_)) => report.updated += 1,
                Ok(Applied::Unchanged) => report.unchanged += 1,
                Ok(Applied::Unmapped) => report.unmapped += 1,
                Err(e) => {
                    warn!(
                        task_id = %task_id,
                        classification = e.classification(),
                        error = %e,
                        "Server status update failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            updated = report.updated,
            unchanged = report.unchanged,
            unmatched = report.unmatched,
            unmapped = report.unmapped,
            failed = report.failed,
            "Reconciliation complete"
        );

        Ok(report)
    }

    /// Refresh one job from the get-one endpoint
    pub async fn refresh_one(&self, task_id: &str) -> Result<RefreshOutcome, JobError> {
        let record = self
            .store
            .find_by_task_id(task_id)
            .await?
            .ok_or_else(|| JobError::UnknownTask(task_id.to_string()))?;

        if !record.is_reconcilable() {
            return Ok(RefreshOutcome::NotPolled(record.server_status));
        }

        let job = self.service.get_job(task_id).await?;

        Ok(match self.apply(&record, task_id, &job.status).await? {
            Applied::Updated(status) => RefreshOutcome::Updated(status),
            Applied::Unchanged => RefreshOutcome::Unchanged(record.server_status),
            Applied::Unmapped => RefreshOutcome::Unmapped(job.status),
        })
    }

    async fn apply(
        &self,
        record: &JobRecord,
        task_id: &str,
        remote_status: &str,
    ) -> Result<Applied, JobError> {
        let next = match map_remote_status(remote_status) {
            RemoteStatus::Mapped(next) => next,
            RemoteStatus::Unmapped(raw) => {
                debug!(task_id = %task_id, remote_status = %raw, "Unmapped remote status, skipping");
                return Ok(Applied::Unmapped);
            }
        };

        if !record.server_status.can_transition_to(next) {
            if next != record.server_status {
                warn!(
                    task_id = %task_id,
                    current = %record.server_status,
                    remote = %next,
                    "Remote status would move backwards, ignoring"
                );
            }
            return Ok(Applied::Unchanged);
        }

        if self.store.update_server_status(task_id, next).await? {
            info!(
                task_id = %task_id,
                from = %record.server_status,
                to = %next,
                "Server status updated"
            );
            Ok(Applied::Updated(next))
        } else {
            Ok(Applied::Unchanged)
        }
    }
}
