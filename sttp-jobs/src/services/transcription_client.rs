//! Remote transcription service client
//!
//! [`TranscriptionService`] is the transport seam used by every phase;
//! [`RecappClient`] talks to the REST API:
//!
//! | call            | request                               |
//! |-----------------|---------------------------------------|
//! | submit          | `POST {api}/jobs` (multipart)         |
//! | get-one         | `GET {api}/jobs/{id}`                 |
//! | list-all        | `GET {api}/jobs`                      |
//! | get-transcript  | `GET {api}/jobs/{id}/transcript`      |
//!
//! Any HTTP status outside [200, 300) and any transport-level failure is an error.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("sttp-jobs/", env!("CARGO_PKG_VERSION"));
const JOBS_ENDPOINT: &str = "jobs";

/// Transport client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Artifact read error {0}: {1}")]
    ArtifactError(PathBuf, String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Short failure class used in per-record diagnostics
    pub fn classification(&self) -> &'static str {
        match self {
            ClientError::NetworkError(_) | ClientError::ApiError(_, _) => "transport",
            ClientError::ParseError(_) => "parse",
            ClientError::ArtifactError(_, _) => "artifact-read",
            ClientError::Configuration(_) => "configuration",
        }
    }
}

/// Job object as listed by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteJob {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub status: String,
}

/// Everything needed to submit one artifact
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub audio_path: PathBuf,
    /// Model / language selector
    pub language: String,
    pub additional_vocab: Vec<String>,
    pub priority: Option<String>,
}

/// Transport operations against the remote transcription service
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Upload an artifact, returning the remote job id
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError>;

    /// Fetch one job
    async fn get_job(&self, task_id: &str) -> Result<RemoteJob, ClientError>;

    /// Fetch every job the service lists
    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ClientError>;

    /// Fetch the raw transcript payload of a finished job
    async fn get_transcript(&self, task_id: &str) -> Result<String, ClientError>;
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://asr.example.org/api/v1`
    pub api: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub requests_per_second: u32,
}

/// REST client for the remote transcription service
pub struct RecappClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    api: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

impl RecappClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            ClientError::Configuration("requests_per_second must be non-zero".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            api: config.api.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/{}", self.api, JOBS_ENDPOINT)
    }

    fn job_url(&self, task_id: &str) -> String {
        format!("{}/{}/{}", self.api, JOBS_ENDPOINT, task_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send after waiting for the request quota; non-2xx becomes [`ClientError::ApiError`]
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), url = %response.url(), "HTTP response");

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn build_form(request: &SubmitRequest) -> Result<reqwest::multipart::Form, ClientError> {
        let bytes = tokio::fs::read(&request.audio_path)
            .await
            .map_err(|e| ClientError::ArtifactError(request.audio_path.clone(), e.to_string()))?;

        let file_name = file_name_of(&request.audio_path);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let vocab = serde_json::to_string(&request.additional_vocab)
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(reqwest::multipart::Form::new()
            .part("data_file", part)
            .text("language", request.language.clone())
            .text("additional_vocab", vocab)
            .text("priority", request.priority.clone().unwrap_or_default()))
    }
}

#[async_trait]
impl TranscriptionService for RecappClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError> {
        let form = Self::build_form(request).await?;

        tracing::debug!(
            file = %request.audio_path.display(),
            language = %request.language,
            "Submitting transcription job"
        );

        let response = self
            .send(
                self.http_client
                    .post(self.jobs_url())
                    .header(reqwest::header::ACCEPT, "*/*")
                    .multipart(form),
            )
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        parse_submit_response(&body)
    }

    async fn get_job(&self, task_id: &str) -> Result<RemoteJob, ClientError> {
        let response = self
            .send(
                self.http_client
                    .get(self.job_url(task_id))
                    .header(reqwest::header::ACCEPT, "application/json"),
            )
            .await?;

        response
            .json::<RemoteJob>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ClientError> {
        let response = self
            .send(
                self.http_client
                    .get(self.jobs_url())
                    .header(reqwest::header::ACCEPT, "application/json"),
            )
            .await?;

        let jobs: Vec<RemoteJob> = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))?;

        tracing::debug!(jobs = jobs.len(), "Retrieved remote job list");
        Ok(jobs)
    }

    async fn get_transcript(&self, task_id: &str) -> Result<String, ClientError> {
        let response = self
            .send(
                self.http_client
                    .get(format!("{}/transcript", self.job_url(task_id)))
                    .header(reqwest::header::ACCEPT, "application/json"),
            )
            .await?;

        response
            .text()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))
    }
}

/// Extract the job id from a submit response body
///
/// The id may come back as a JSON string or number.
pub fn parse_submit_response(body: &str) -> Result<String, ClientError> {
    let parsed: SubmitResponse =
        serde_json::from_str(body).map_err(|e| ClientError::ParseError(e.to_string()))?;

    match parsed.id {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => Ok(id),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ClientError::ParseError(format!(
            "unusable job id in submit response: {}",
            other
        ))),
        None => Err(ClientError::ParseError(
            "submit response has no job id".to_string(),
        )),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string())
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "job id must be a string or number, got {}",
            other
        ))),
    }
}
