//! sttp-jobs library interface
//!
//! Transcription job pipeline: submission, reconciliation, download,
//! normalization and audit, plus the read-only status API.

pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, JobError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::db::SqliteJobStore;
use crate::services::CycleSummary;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteJobStore,
    pub startup_time: DateTime<Utc>,
    /// Summary of the most recent finished cycle
    pub last_cycle: Arc<RwLock<Option<CycleSummary>>>,
    /// Last cycle failure, cleared by the next clean cycle
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(store: SqliteJobStore) -> Self {
        Self {
            store,
            startup_time: Utc::now(),
            last_cycle: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Publish the outcome of a cycle to the status API
    pub async fn record_cycle(&self, outcome: Result<CycleSummary, String>) {
        match outcome {
            Ok(summary) => {
                *self.last_error.write().await = if summary.is_clean() {
                    None
                } else {
                    Some(
                        summary
                            .errors
                            .iter()
                            .map(|(phase, e)| format!("{}: {}", phase, e))
                            .collect::<Vec<_>>()
                            .join("; "),
                    )
                };
                *self.last_cycle.write().await = Some(summary);
            }
            Err(e) => *self.last_error.write().await = Some(e),
        }
    }
}

/// Build the status API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::job_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
