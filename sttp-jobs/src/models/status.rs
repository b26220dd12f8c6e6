//! Job lifecycle status dimensions
//!
//! Each dimension is owned by exactly one phase:
//! - [`SentStatus`]: written once by submission
//! - [`ServerStatus`]: advanced only by the reconciler
//! - [`DownloadStatus`]: advanced only by the downloader
//!
//! Statuses persist as their upper-case names (`"DELIVERED"`, `"NOT_STARTED"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the submission request reached the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentStatus {
    Delivered,
    Failed,
}

/// Job status on the remote service, as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    Pending,
    Running,
    Done,
    Rejected,
    Deleted,
    Expired,
}

/// Local transcript retrieval state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    NotStarted,
    Completed,
    Failed,
}

impl SentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentStatus::Delivered => "DELIVERED",
            SentStatus::Failed => "FAILED",
        }
    }
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 6] = [
        ServerStatus::Pending,
        ServerStatus::Running,
        ServerStatus::Done,
        ServerStatus::Rejected,
        ServerStatus::Deleted,
        ServerStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Pending => "PENDING",
            ServerStatus::Running => "RUNNING",
            ServerStatus::Done => "DONE",
            ServerStatus::Rejected => "REJECTED",
            ServerStatus::Deleted => "DELETED",
            ServerStatus::Expired => "EXPIRED",
        }
    }

    /// Statuses the reconciler still polls
    pub fn is_polled(&self) -> bool {
        matches!(self, ServerStatus::Pending | ServerStatus::Running)
    }

    /// Forward-only transition table
    ///
    /// PENDING → RUNNING → DONE, and PENDING | RUNNING → REJECTED.
    /// Everything else, including staying put, is not a transition.
    pub fn can_transition_to(&self, next: ServerStatus) -> bool {
        matches!(
            (self, next),
            (ServerStatus::Pending, ServerStatus::Running)
                | (ServerStatus::Pending, ServerStatus::Done)
                | (ServerStatus::Pending, ServerStatus::Rejected)
                | (ServerStatus::Running, ServerStatus::Done)
                | (ServerStatus::Running, ServerStatus::Rejected)
        )
    }
}

impl DownloadStatus {
    pub const ALL: [DownloadStatus; 3] = [
        DownloadStatus::NotStarted,
        DownloadStatus::Completed,
        DownloadStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::NotStarted => "NOT_STARTED",
            DownloadStatus::Completed => "COMPLETED",
            DownloadStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for SentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELIVERED" => Ok(SentStatus::Delivered),
            "FAILED" => Ok(SentStatus::Failed),
            other => Err(format!("unknown sent status: {}", other)),
        }
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown server status: {}", s))
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DownloadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown download status: {}", s))
    }
}

impl fmt::Display for SentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of interpreting a remote status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// The string maps onto a local status
    Mapped(ServerStatus),
    /// No mapping; the stored status must stay as it is
    Unmapped(String),
}

/// Map a remote job status string onto [`ServerStatus`]
///
/// | remote       | local    |
/// |--------------|----------|
/// | `"running"`  | RUNNING  |
/// | `"done"`     | DONE     |
/// | `"rejected"` | REJECTED |
/// | other        | unmapped |
pub fn map_remote_status(remote: &str) -> RemoteStatus {
    match remote {
        "running" => RemoteStatus::Mapped(ServerStatus::Running),
        "done" => RemoteStatus::Mapped(ServerStatus::Done),
        "rejected" => RemoteStatus::Mapped(ServerStatus::Rejected),
        other => RemoteStatus::Unmapped(other.to_string()),
    }
}
