//! Read-only job endpoints
//!
//! - `GET /jobs` - records, filtered by query parameters
//! - `GET /jobs/summary` - counts per status combination and the last cycle
//! - `GET /jobs/:task_id` - one record

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::{JobFilter, JobStore};
use crate::error::{ApiError, ApiResult};
use crate::models::{DownloadStatus, JobRecord, SentStatus, ServerStatus};
use crate::services::CycleSummary;
use crate::AppState;

/// Query parameters of `GET /jobs`
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub sent_status: Option<String>,
    /// Comma separated, e.g. `PENDING,RUNNING`
    pub server_status: Option<String>,
    pub download_status: Option<String>,
    pub file_name: Option<String>,
}

impl JobQuery {
    fn into_filter(self) -> ApiResult<JobFilter> {
        let server_statuses = match self.server_status.as_deref() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_param::<ServerStatus>)
                .collect::<ApiResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(JobFilter {
            sent_status: self.sent_status.as_deref().map(parse_param).transpose()?,
            server_statuses,
            download_status: self.download_status.as_deref().map(parse_param).transpose()?,
            file_name: self.file_name,
        })
    }
}

fn parse_param<T: FromStr<Err = String>>(value: &str) -> ApiResult<T> {
    value.parse().map_err(ApiError::BadRequest)
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub sent_status: SentStatus,
    pub server_status: ServerStatus,
    pub download_status: DownloadStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct JobSummaryResponse {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub last_cycle: Option<CycleSummary>,
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let filter = query.into_filter()?;
    let jobs = state.store.find(&filter).await?;

    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// GET /jobs/summary
pub async fn job_summary(State(state): State<AppState>) -> ApiResult<Json<JobSummaryResponse>> {
    let by_status: Vec<StatusCount> = state
        .store
        .count_by_status()
        .await?
        .into_iter()
        .map(|(sent_status, server_status, download_status, count)| StatusCount {
            sent_status,
            server_status,
            download_status,
            count,
        })
        .collect();

    let total = by_status.iter().map(|c| c.count).sum();
    let last_cycle = state.last_cycle.read().await.clone();

    Ok(Json(JobSummaryResponse {
        total,
        by_status,
        last_cycle,
    }))
}

/// GET /jobs/:task_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    state
        .store
        .find_by_task_id(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No job with task id {}", task_id)))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/summary", get(job_summary))
        .route("/jobs/:task_id", get(get_job))
}
