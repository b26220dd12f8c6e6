//! Download phase
//!
//! Fetches the transcript of every DONE job exactly once. The payload and
//! the COMPLETED flag are written in one guarded update, so a repeated
//! run over the same records changes nothing.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::{JobFilter, JobStore};
use crate::error::JobError;
use crate::services::transcription_client::TranscriptionService;

/// Default pause between two transcript fetches
pub const DEFAULT_DOWNLOAD_INTERVAL: Duration = Duration::from_millis(1000);

/// Totals of one download pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadReport {
    pub attempted: usize,
    pub completed: usize,
    /// Fetched, but another writer completed the record first
    pub skipped: usize,
    pub failed: usize,
}

pub struct Downloader {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn JobStore>,
    interval: Duration,
}

impl Downloader {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        store: Arc<dyn JobStore>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            store,
            interval,
        }
    }

    /// Download every finished, not yet fetched transcript
    ///
    /// Records are processed one at a time with `interval` between fetches.
    /// A failed fetch leaves its record untouched for the next pass.
    pub async fn download_pending(&self) -> Result<DownloadReport, JobError> {
        let ready = self.store.find(&JobFilter::awaiting_download()).await?;
        let mut report = DownloadReport::default();

        if ready.is_empty() {
            debug!("No transcripts awaiting download");
            return Ok(report);
        }

        info!(jobs = ready.len(), "Downloading transcripts");

        for record in &ready {
            let Some(task_id) = record.task_id.as_deref() else {
                continue;
            };
            report.attempted += 1;

            match self.download_one(task_id).await {
                Ok(true) => report.completed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        task_id = %task_id,
                        file = %record.file_name,
                        classification = e.classification(),
                        error = %e,
                        "Transcript download failed"
                    );
                    report.failed += 1;
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        info!(
            attempted = report.attempted,
            completed = report.completed,
            skipped = report.skipped,
            failed = report.failed,
            "Download pass complete"
        );

        Ok(report)
    }

    async fn download_one(&self, task_id: &str) -> Result<bool, JobError> {
        let payload = self.service.get_transcript(task_id).await?;

        if payload.trim().is_empty() {
            return Err(JobError::Parse("empty transcript payload".to_string()));
        }

        let completed = self.store.complete_download(task_id, &payload).await?;
        if completed {
            info!(task_id = %task_id, bytes = payload.len(), "Transcript downloaded");
        } else {
            debug!(task_id = %task_id, "Record no longer awaiting download");
        }

        Ok(completed)
    }
}
