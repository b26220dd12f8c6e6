//! Canonical transcript model
//!
//! Provider-agnostic text representation written to the transcript sink,
//! separate from the job store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::JobRecord;

/// Normalized transcript of one completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTranscript {
    /// Remote job the transcript came from; unique in the sink
    pub source_task_id: String,
    /// Which technology produced it (e.g. "recapp")
    pub technology: String,
    /// Which model produced it
    pub model: String,
    pub file_name: String,
    pub convo_id: String,
    pub ambient_variant: String,
    pub processed_volume: String,
    /// Merged transcript text
    pub text: String,
    /// Provider payload as downloaded
    pub raw_transcript_data: String,
    pub created_at: DateTime<Utc>,
}

impl CanonicalTranscript {
    /// Project a completed job record plus its merged text
    ///
    /// Returns `None` for records without a remote task id.
    pub fn from_record(
        record: &JobRecord,
        technology: &str,
        model: &str,
        text: String,
    ) -> Option<Self> {
        let source_task_id = record.task_id.clone()?;
        Some(Self {
            source_task_id,
            technology: technology.to_string(),
            model: model.to_string(),
            file_name: record.file_name.clone(),
            convo_id: record.convo_id.clone(),
            ambient_variant: record.ambient_variant.clone(),
            processed_volume: record.processed_volume.clone(),
            text,
            raw_transcript_data: record.raw_transcript_data.clone(),
            created_at: Utc::now(),
        })
    }
}
