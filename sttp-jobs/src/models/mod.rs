//! Data models for sttp-jobs

pub mod artifact;
pub mod job_record;
pub mod status;
pub mod transcript;

pub use artifact::ArtifactName;
pub use job_record::JobRecord;
pub use status::{map_remote_status, DownloadStatus, RemoteStatus, SentStatus, ServerStatus};
pub use transcript::CanonicalTranscript;
