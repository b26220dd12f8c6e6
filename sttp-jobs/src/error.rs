//! Error types for sttp-jobs
//!
//! `JobError` classifies per-record failures of the pipeline phases.
//! `ApiError` is the status API's JSON error response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::artifact_scanner::ScanError;
use crate::services::transcription_client::ClientError;

/// Failure of one pipeline operation
#[derive(Debug, Error)]
pub enum JobError {
    /// Artifact name is not `<convoId>_<ambientVariant>_<processedVolume>.<ext>`
    #[error("Naming convention error: {0}")]
    NamingConvention(String),

    /// Remote call failed (network, non-2xx, or undecodable body)
    #[error(transparent)]
    Transport(#[from] ClientError),

    /// Stored payload does not match a known provider shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Job or transcript store failure
    #[error("Store error: {0}")]
    Store(#[from] sttp_common::Error),

    /// Source directory could not be listed
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// No job record carries this task id
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

impl JobError {
    /// Short failure class used in per-record diagnostics
    pub fn classification(&self) -> &'static str {
        match self {
            JobError::NamingConvention(_) => "naming-convention",
            JobError::Transport(e) => e.classification(),
            JobError::Parse(_) => "parse",
            JobError::Store(_) => "store",
            JobError::Scan(_) => "scan",
            JobError::UnknownTask(_) => "unknown-task",
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] sttp_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Store(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
