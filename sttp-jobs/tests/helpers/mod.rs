//! Shared test utilities for sttp-jobs
//!
//! - [`FakeService`]: scriptable in-process transcription service
//! - in-memory SQLite stores, plus wrappers whose writes fail for chosen task ids
//! - artifact fixtures
//! - [`log_capture::LogCapture`] for asserting on diagnostics

#![allow(dead_code)]

pub mod log_capture;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sttp_jobs::db::{JobFilter, JobStore, SqliteJobStore, SqliteTranscriptStore, TranscriptSink};
use sttp_jobs::models::{ArtifactName, CanonicalTranscript, JobRecord, ServerStatus};
use sttp_jobs::services::{ClientError, RemoteJob, SubmitRequest, TranscriptionService};

pub const WORD_LEVEL_PAYLOAD: &str = r#"{"results":[{"alternatives":[{"content":"Hello"}]},{"alternatives":[{"content":"world"}]}]}"#;
pub const SENTENCE_LEVEL_PAYLOAD: &str = r#"[{"text":"Hello"},{"text":"world"}]"#;

#[derive(Default)]
struct FakeState {
    submit_ids: VecDeque<String>,
    fail_submissions: bool,
    fail_list: bool,
    remote_jobs: Vec<RemoteJob>,
    transcripts: HashMap<String, String>,
    submitted: Vec<SubmitRequest>,
    transcript_calls: Vec<String>,
    list_calls: usize,
}

/// In-process stand-in for the remote transcription service
#[derive(Default)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ids handed out by successive submissions; afterwards `job-<n>`
    pub fn queue_submit_ids(&self, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.submit_ids.extend(ids.iter().map(|id| id.to_string()));
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submissions = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    /// Add or replace a remote job
    pub fn set_remote_status(&self, id: &str, status: &str) {
        let mut state = self.state.lock().unwrap();
        state.remote_jobs.retain(|job| job.id != id);
        state.remote_jobs.push(RemoteJob {
            id: id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn set_transcript(&self, id: &str, payload: &str) {
        self.state
            .lock()
            .unwrap()
            .transcripts
            .insert(id.to_string(), payload.to_string());
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn transcript_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().transcript_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl TranscriptionService for FakeService {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(request.clone());

        if state.fail_submissions {
            return Err(ClientError::ApiError(503, "unavailable".to_string()));
        }

        let id = match state.submit_ids.pop_front() {
            Some(id) => id,
            None => format!("job-{}", state.submitted.len()),
        };
        state.remote_jobs.push(RemoteJob {
            id: id.clone(),
            status: "queued".to_string(),
        });
        Ok(id)
    }

    async fn get_job(&self, task_id: &str) -> Result<RemoteJob, ClientError> {
        self.state
            .lock()
            .unwrap()
            .remote_jobs
            .iter()
            .find(|job| job.id == task_id)
            .cloned()
            .ok_or_else(|| ClientError::ApiError(404, format!("no job {}", task_id)))
    }

    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_list {
            return Err(ClientError::NetworkError("connection refused".to_string()));
        }
        Ok(state.remote_jobs.clone())
    }

    async fn get_transcript(&self, task_id: &str) -> Result<String, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.transcript_calls.push(task_id.to_string());
        state
            .transcripts
            .get(task_id)
            .cloned()
            .ok_or_else(|| ClientError::ApiError(404, format!("no transcript for {}", task_id)))
    }
}

fn injected_failure(task_id: &str) -> sttp_common::Error {
    sttp_common::Error::Internal(format!("injected write failure for {}", task_id))
}

/// Job store whose status and download writes fail for the listed task ids
pub struct FailingWriteStore {
    inner: Arc<SqliteJobStore>,
    failing: Vec<String>,
}

impl FailingWriteStore {
    pub fn new(inner: Arc<SqliteJobStore>, failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: failing.iter().map(|id| id.to_string()).collect(),
        })
    }

    fn fails(&self, task_id: &str) -> bool {
        self.failing.iter().any(|id| id == task_id)
    }
}

#[async_trait]
impl JobStore for FailingWriteStore {
    async fn insert(&self, record: &JobRecord) -> sttp_common::Result<()> {
        self.inner.insert(record).await
    }

    async fn find(&self, filter: &JobFilter) -> sttp_common::Result<Vec<JobRecord>> {
        self.inner.find(filter).await
    }

    async fn find_by_task_id(&self, task_id: &str) -> sttp_common::Result<Option<JobRecord>> {
        self.inner.find_by_task_id(task_id).await
    }

    async fn update_server_status(
        &self,
        task_id: &str,
        status: ServerStatus,
    ) -> sttp_common::Result<bool> {
        if self.fails(task_id) {
            return Err(injected_failure(task_id));
        }
        self.inner.update_server_status(task_id, status).await
    }

    async fn complete_download(
        &self,
        task_id: &str,
        raw_transcript_data: &str,
    ) -> sttp_common::Result<bool> {
        if self.fails(task_id) {
            return Err(injected_failure(task_id));
        }
        self.inner.complete_download(task_id, raw_transcript_data).await
    }

    async fn ping(&self) -> sttp_common::Result<()> {
        self.inner.ping().await
    }
}

/// Transcript sink that refuses writes for the listed task ids
pub struct FailingSink {
    inner: Arc<SqliteTranscriptStore>,
    failing: Vec<String>,
}

impl FailingSink {
    pub fn new(inner: Arc<SqliteTranscriptStore>, failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: failing.iter().map(|id| id.to_string()).collect(),
        })
    }
}

#[async_trait]
impl TranscriptSink for FailingSink {
    async fn write(&self, transcript: &CanonicalTranscript) -> sttp_common::Result<()> {
        if self.failing.contains(&transcript.source_task_id) {
            return Err(injected_failure(&transcript.source_task_id));
        }
        self.inner.write(transcript).await
    }
}

/// Single-connection in-memory pool; every connection of `:memory:` is its own database
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database")
}

pub async fn job_store(pool: &SqlitePool) -> Arc<SqliteJobStore> {
    Arc::new(
        SqliteJobStore::new(pool.clone(), 1000)
            .await
            .expect("Failed to create job store"),
    )
}

pub async fn transcript_store(pool: &SqlitePool) -> Arc<SqliteTranscriptStore> {
    Arc::new(
        SqliteTranscriptStore::new(pool.clone(), 1000)
            .await
            .expect("Failed to create transcript store"),
    )
}

/// Write a small artifact file into `dir`
pub fn write_artifact(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF0000WAVE").expect("Failed to write artifact");
    path
}

/// Insert a DELIVERED record for `file_name` with `task_id`
pub async fn insert_delivered(store: &SqliteJobStore, file_name: &str, task_id: &str) -> JobRecord {
    let artifact = ArtifactName::parse(file_name).expect("valid artifact name");
    let record = JobRecord::delivered(&artifact, task_id.to_string());
    store.insert(&record).await.expect("insert");
    record
}

/// Insert a DELIVERED record already moved to `status`
pub async fn insert_with_status(
    store: &SqliteJobStore,
    file_name: &str,
    task_id: &str,
    status: ServerStatus,
) -> JobRecord {
    insert_delivered(store, file_name, task_id).await;
    if status != ServerStatus::Pending {
        assert!(store.update_server_status(task_id, status).await.expect("update"));
    }
    store
        .find_by_task_id(task_id)
        .await
        .expect("find")
        .expect("record exists")
}

/// Insert a record whose transcript has been downloaded
pub async fn insert_downloaded(
    store: &SqliteJobStore,
    file_name: &str,
    task_id: &str,
    payload: &str,
) -> JobRecord {
    insert_with_status(store, file_name, task_id, ServerStatus::Done).await;
    assert!(store.complete_download(task_id, payload).await.expect("complete"));
    store
        .find_by_task_id(task_id)
        .await
        .expect("find")
        .expect("record exists")
}
