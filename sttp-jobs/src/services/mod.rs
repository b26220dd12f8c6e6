//! Pipeline phases and the transport they share

pub mod artifact_scanner;
pub mod auditor;
pub mod downloader;
pub mod normalizer;
pub mod pipeline;
pub mod reconciler;
pub mod submission;
pub mod transcription_client;

pub use auditor::{AuditReport, Auditor};
pub use downloader::{DownloadReport, Downloader};
pub use normalizer::{merge_transcript, NormalizeReport, Normalizer};
pub use pipeline::{CycleSummary, Pipeline, PipelineOptions, PreflightError};
pub use reconciler::{ReconcileReport, Reconciler, RefreshOutcome};
pub use submission::{Submission, SubmissionOptions, SubmissionReport, SubmitOutcome};
pub use transcription_client::{
    ClientConfig, ClientError, RecappClient, RemoteJob, SubmitRequest, TranscriptionService,
};
