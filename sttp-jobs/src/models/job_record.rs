//! Job record model
//!
//! One record per submission attempt. Records are append-only: they are
//! never deleted and serve as the audit trail of every job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ArtifactName, DownloadStatus, SentStatus, ServerStatus};

/// Local view of one remote transcription job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    /// Local primary key
    pub guid: Uuid,

    /// Remote job id; `None` when the submission never produced one
    pub task_id: Option<String>,

    pub file_name: String,
    pub convo_id: String,
    pub ambient_variant: String,
    pub processed_volume: String,

    pub sent_status: SentStatus,
    pub server_status: ServerStatus,
    pub download_status: DownloadStatus,

    /// Provider payload; empty until the download completed
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_transcript_data: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Record for a submission the service accepted
    pub fn delivered(artifact: &ArtifactName, task_id: String) -> Self {
        Self::new(artifact, Some(task_id))
    }

    /// Record for a submission that produced no remote job
    pub fn failed(artifact: &ArtifactName) -> Self {
        Self::new(artifact, None)
    }

    fn new(artifact: &ArtifactName, task_id: Option<String>) -> Self {
        let now = Utc::now();
        let sent_status = if task_id.is_some() {
            SentStatus::Delivered
        } else {
            SentStatus::Failed
        };

        Self {
            guid: Uuid::new_v4(),
            task_id,
            file_name: artifact.file_name.clone(),
            convo_id: artifact.convo_id.clone(),
            ambient_variant: artifact.ambient_variant.clone(),
            processed_volume: artifact.processed_volume.clone(),
            sent_status,
            server_status: ServerStatus::Pending,
            download_status: DownloadStatus::NotStarted,
            raw_transcript_data: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Delivered with a remote id and still in a polled status
    pub fn is_reconcilable(&self) -> bool {
        self.sent_status == SentStatus::Delivered
            && self.task_id.is_some()
            && self.server_status.is_polled()
    }

    /// Finished remotely but not yet fetched
    pub fn is_downloadable(&self) -> bool {
        self.sent_status == SentStatus::Delivered
            && self.task_id.is_some()
            && self.server_status == ServerStatus::Done
            && self.download_status == DownloadStatus::NotStarted
    }

    pub fn has_transcript(&self) -> bool {
        !self.raw_transcript_data.is_empty()
    }
}
