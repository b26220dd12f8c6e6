//! Transcript normalization
//!
//! Decodes downloaded provider payloads and writes one canonical
//! transcript per completed job to the transcript sink. Two payload shapes
//! are understood:
//!
//! - word level: `{"results": [{"alternatives": [{"content": "..."}]}]}`
//! - sentence level: `[{"text": "..."}]`
//!
//! Fragments are joined with single spaces in payload order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{JobStore, TranscriptSink};
use crate::error::JobError;
use crate::models::CanonicalTranscript;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderPayload {
    WordLevel { results: Vec<WordFragment> },
    SentenceLevel(Vec<Sentence>),
}

#[derive(Debug, Deserialize)]
struct WordFragment {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    text: String,
}

/// Merge a raw provider payload into flat text
pub fn merge_transcript(raw: &str) -> Result<String, JobError> {
    let payload: ProviderPayload = serde_json::from_str(raw)
        .map_err(|e| JobError::Parse(format!("unrecognized transcript payload: {}", e)))?;

    let fragments: Vec<String> = match payload {
        ProviderPayload::WordLevel { results } => results
            .into_iter()
            .enumerate()
            .map(|(index, fragment)| {
                fragment
                    .alternatives
                    .into_iter()
                    .next()
                    .map(|alt| alt.content)
                    .ok_or_else(|| {
                        JobError::Parse(format!("result {} has no alternatives", index))
                    })
            })
            .collect::<Result<_, _>>()?,
        ProviderPayload::SentenceLevel(sentences) => {
            sentences.into_iter().map(|s| s.text).collect()
        }
    };

    Ok(fragments.join(" "))
}

/// Totals of one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub written: usize,
    /// Records without a downloaded payload
    pub skipped: usize,
    pub failed: usize,
}

pub struct Normalizer {
    store: Arc<dyn JobStore>,
    sink: Arc<dyn TranscriptSink>,
    technology: String,
    model: String,
}

impl Normalizer {
    pub fn new(
        store: Arc<dyn JobStore>,
        sink: Arc<dyn TranscriptSink>,
        technology: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            technology: technology.into(),
            model: model.into(),
        }
    }

    /// Normalize every record that carries a payload
    pub async fn normalize_all(&self) -> Result<NormalizeReport, JobError> {
        let records = self.store.find_all().await?;
        let mut report = NormalizeReport::default();

        for record in &records {
            if !record.has_transcript() {
                report.skipped += 1;
                continue;
            }

            let result = async {
                let text = merge_transcript(&record.raw_transcript_data)?;
                let Some(transcript) =
                    CanonicalTranscript::from_record(record, &self.technology, &self.model, text)
                else {
                    return Ok(false);
                };
                self.sink.write(&transcript).await?;
                Ok::<bool, JobError>(true)
            }
            .await;

            match result {
                Ok(true) => {
                    debug!(task_id = record.task_id.as_deref().unwrap_or("-"), "Transcript normalized");
                    report.written += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        task_id = record.task_id.as_deref().unwrap_or("-"),
                        file = %record.file_name,
                        classification = e.classification(),
                        error = %e,
                        "Transcript normalization failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            technology = %self.technology,
            "Normalization complete"
        );

        Ok(report)
    }
}
