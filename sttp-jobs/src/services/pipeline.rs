//! Batch cycle
//!
//! One cycle runs the idempotent phases in order:
//! reconcile, download, normalize, audit. Submission is never part of a
//! cycle; it is invoked explicitly.
//!
//! A cycle assumes it is the only writer of the job store. Nothing here
//! guards against two processes running cycles on the same database.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sttp_common::config::TomlConfig;
use thiserror::Error;
use tracing::{error, info};

use crate::db::{JobStore, TranscriptSink};
use crate::services::auditor::{AuditReport, Auditor};
use crate::services::downloader::{DownloadReport, Downloader};
use crate::services::normalizer::{NormalizeReport, Normalizer};
use crate::services::reconciler::{ReconcileReport, Reconciler};
use crate::services::submission::{Submission, SubmissionOptions};
use crate::services::transcription_client::TranscriptionService;

/// Startup checks that make a cycle pointless
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Job store unreachable: {0}")]
    Store(#[from] sttp_common::Error),

    #[error("Transcription service unreachable: {0}")]
    Service(#[from] crate::services::transcription_client::ClientError),
}

/// Settings shared by the phases
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source_dir: PathBuf,
    pub media_extension: String,
    pub technology: String,
    pub model: String,
    pub download_interval: Duration,
    pub submission: SubmissionOptions,
}

impl PipelineOptions {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            media_extension: config.media_extension.clone(),
            technology: config.technology.clone(),
            model: config.model.clone(),
            download_interval: Duration::from_millis(config.download_interval_ms),
            submission: SubmissionOptions {
                language: config.model.clone(),
                additional_vocab: config.additional_vocab.clone(),
                priority: config.priority.clone(),
                duplicate_policy: config.duplicate_policy,
                media_extension: config.media_extension.clone(),
            },
        }
    }
}

/// Outcome of one cycle; a phase that errored has `None` and an entry in `errors`
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reconcile: Option<ReconcileReport>,
    pub download: Option<DownloadReport>,
    pub normalize: Option<NormalizeReport>,
    pub audit: Option<AuditReport>,
    /// `(phase, error)` pairs
    pub errors: Vec<(String, String)>,
}

impl CycleSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Wires the phases to one service, store and sink
#[derive(Clone)]
pub struct Pipeline {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn JobStore>,
    sink: Arc<dyn TranscriptSink>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        store: Arc<dyn JobStore>,
        sink: Arc<dyn TranscriptSink>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            service,
            store,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn submission(&self) -> Submission {
        Submission::new(
            Arc::clone(&self.service),
            Arc::clone(&self.store),
            self.options.submission.clone(),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.service), Arc::clone(&self.store))
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(
            Arc::clone(&self.service),
            Arc::clone(&self.store),
            self.options.download_interval,
        )
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.options.technology.clone(),
            self.options.model.clone(),
        )
    }

    pub fn auditor(&self) -> Auditor {
        Auditor::new(Arc::clone(&self.store), &self.options.media_extension)
    }

    /// Verify the store answers and the service lists jobs
    pub async fn preflight(&self) -> Result<(), PreflightError> {
        self.store.ping().await?;
        let jobs = self.service.list_jobs().await?;
        info!(remote_jobs = jobs.len(), "Preflight passed");
        Ok(())
    }

    /// Run one cycle
    ///
    /// Fails only if preflight fails. Phase errors are logged and recorded
    /// in the summary; later phases still run.
    pub async fn run_cycle(&self) -> Result<CycleSummary, PreflightError> {
        self.preflight().await?;

        let mut summary = CycleSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            reconcile: None,
            download: None,
            normalize: None,
            audit: None,
            errors: Vec::new(),
        };

        match self.reconciler().reconcile().await {
            Ok(report) => summary.reconcile = Some(report),
            Err(e) => record_phase_error(&mut summary, "reconcile", &e),
        }

        match self.downloader().download_pending().await {
            Ok(report) => summary.download = Some(report),
            Err(e) => record_phase_error(&mut summary, "download", &e),
        }

        match self.normalizer().normalize_all().await {
            Ok(report) => summary.normalize = Some(report),
            Err(e) => record_phase_error(&mut summary, "normalize", &e),
        }

        match self.auditor().audit(&self.options.source_dir).await {
            Ok(report) => summary.audit = Some(report),
            Err(e) => record_phase_error(&mut summary, "audit", &e),
        }

        summary.finished_at = Utc::now();
        info!(
            errors = summary.errors.len(),
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "Cycle complete"
        );

        Ok(summary)
    }
}

fn record_phase_error(summary: &mut CycleSummary, phase: &str, e: &crate::error::JobError) {
    error!(phase, classification = e.classification(), error = %e, "Phase failed");
    summary.errors.push((phase.to_string(), e.to_string()));
}
