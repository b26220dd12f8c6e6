//! Persistence for sttp-jobs
//!
//! Two independently constructed repositories, each bound to its pool at
//! construction:
//! - [`SqliteJobStore`]: job records (`transcription_jobs`)
//! - [`SqliteTranscriptStore`]: canonical transcripts (`canonical_transcripts`)

pub mod jobs;
pub mod transcripts;

pub use jobs::{JobFilter, JobStore, SqliteJobStore};
pub use transcripts::{SqliteTranscriptStore, TranscriptSink};
