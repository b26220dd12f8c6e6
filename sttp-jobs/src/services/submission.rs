//! Submission phase
//!
//! Turns an artifact into a remote job and records exactly one
//! [`JobRecord`] per attempt. A transport failure is not an error of the
//! submission: it yields a FAILED record without a task id.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sttp_common::config::DuplicatePolicy;
use tracing::{info, warn};

use crate::db::{JobFilter, JobStore};
use crate::error::JobError;
use crate::models::{ArtifactName, JobRecord};
use crate::services::artifact_scanner::ArtifactScanner;
use crate::services::transcription_client::{SubmitRequest, TranscriptionService};

/// Per-submission settings
#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    pub language: String,
    pub additional_vocab: Vec<String>,
    pub priority: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
    pub media_extension: String,
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Service accepted the job
    Delivered(JobRecord),
    /// Service could not be reached or refused; record kept as FAILED
    Failed(JobRecord),
    /// A delivered job for this file already exists and the policy rejects duplicates
    SkippedDuplicate { file_name: String },
}

/// Totals of a directory submission
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped_duplicates: usize,
    /// Files that could not be submitted at all, with the reason
    pub errors: Vec<(String, String)>,
}

pub struct Submission {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn JobStore>,
    options: SubmissionOptions,
}

impl Submission {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        store: Arc<dyn JobStore>,
        options: SubmissionOptions,
    ) -> Self {
        Self {
            service,
            store,
            options,
        }
    }

    /// Submit one artifact
    ///
    /// Fails with [`JobError::NamingConvention`] before any remote call if
    /// the file name does not follow the convention. Every well-named path
    /// yields exactly one record; a missing file is recorded as FAILED
    /// without contacting the service. Fails with [`JobError::Store`] if
    /// the record cannot be written.
    pub async fn submit(&self, path: &Path) -> Result<SubmitOutcome, JobError> {
        let artifact = ArtifactName::from_path(path)?;

        if self.options.duplicate_policy == DuplicatePolicy::Reject {
            let existing = self
                .store
                .find(&JobFilter::delivered_file(&artifact.file_name))
                .await?;
            if !existing.is_empty() {
                info!(
                    file = %artifact.file_name,
                    existing = existing.len(),
                    "Delivered job already exists, skipping submission"
                );
                return Ok(SubmitOutcome::SkippedDuplicate {
                    file_name: artifact.file_name,
                });
            }
        }

        let record = if !path.is_file() {
            warn!(
                file = %artifact.file_name,
                path = %path.display(),
                classification = "artifact-not-found",
                "Artifact missing, recording FAILED job"
            );
            JobRecord::failed(&artifact)
        } else {
            let request = SubmitRequest {
                audio_path: path.to_path_buf(),
                language: self.options.language.clone(),
                additional_vocab: self.options.additional_vocab.clone(),
                priority: self.options.priority.clone(),
            };

            match self.service.submit(&request).await {
                Ok(task_id) => {
                    info!(file = %artifact.file_name, task_id = %task_id, "Job submitted");
                    JobRecord::delivered(&artifact, task_id)
                }
                Err(e) => {
                    warn!(
                        file = %artifact.file_name,
                        classification = e.classification(),
                        error = %e,
                        "Submission failed, recording FAILED job"
                    );
                    JobRecord::failed(&artifact)
                }
            }
        };

        if let Err(e) = self.store.insert(&record).await {
            // The remote job exists but is not tracked; the id is only in this log line
            tracing::error!(
                file = %record.file_name,
                task_id = record.task_id.as_deref().unwrap_or("-"),
                classification = "store",
                error = %e,
                "Failed to record submission"
            );
            return Err(JobError::Store(e));
        }

        Ok(if record.task_id.is_some() {
            SubmitOutcome::Delivered(record)
        } else {
            SubmitOutcome::Failed(record)
        })
    }

    /// Submit every artifact in `dir`, in name order
    pub async fn submit_directory(&self, dir: &Path) -> Result<SubmissionReport, JobError> {
        let scanner = ArtifactScanner::new(&self.options.media_extension);
        let artifacts = scanner.scan(dir)?;

        info!(
            dir = %dir.display(),
            artifacts = artifacts.len(),
            "Submitting source directory"
        );

        let report = self.submit_paths(&artifacts).await;

        info!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped_duplicates,
            errors = report.errors.len(),
            "Directory submission complete"
        );

        Ok(report)
    }

    /// Submit each path in order
    ///
    /// Per-file errors are reported and never stop the batch.
    pub async fn submit_paths(&self, paths: &[PathBuf]) -> SubmissionReport {
        let mut report = SubmissionReport::default();
        for path in paths {
            match self.submit(path).await {
                Ok(SubmitOutcome::Delivered(_)) => report.delivered += 1,
                Ok(SubmitOutcome::Failed(_)) => report.failed += 1,
                Ok(SubmitOutcome::SkippedDuplicate { .. }) => report.skipped_duplicates += 1,
                Err(e) => {
                    warn!(
                        file = %display_name(path),
                        classification = e.classification(),
                        error = %e,
                        "Artifact not submitted"
                    );
                    report.errors.push((display_name(path), e.to_string()));
                }
            }
        }
        report
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
