//! RecappClient against a local HTTP stand-in for the remote service

use axum::{
    body::Bytes,
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

use sttp_jobs::services::{
    ClientConfig, ClientError, RecappClient, SubmitRequest, TranscriptionService,
};

const TOKEN: &str = "secret";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn create_job(headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let body = String::from_utf8_lossy(&body);
    let well_formed = content_type.starts_with("multipart/form-data")
        && body.contains("name=\"data_file\"")
        && body.contains("audio/mpeg")
        && body.contains("name=\"language\"")
        && body.contains("[\"Wald\"]");

    if well_formed {
        (StatusCode::CREATED, Json(json!({"id": 42})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"error": "bad form"})))
    }
}

async fn list_jobs() -> Json<Value> {
    Json(json!([
        {"id": "a", "status": "running"},
        {"id": 7, "status": "done"}
    ]))
}

async fn get_job(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "a" {
        Ok(Json(json!({"id": "a", "status": "running", "language": "de"})))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn get_transcript(Path(id): Path<String>) -> Result<String, StatusCode> {
    match id.as_str() {
        "a" => Ok(r#"[{"text":"Hello"},{"text":"world"}]"#.to_string()),
        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn spawn_remote() -> String {
    let app = Router::new()
        .route("/api/v1/jobs", get(list_jobs).post(create_job))
        .route("/api/v1/jobs/:id", get(get_job))
        .route("/api/v1/jobs/:id/transcript", get(get_transcript));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/v1/", addr)
}

fn client(api: &str, token: Option<&str>) -> RecappClient {
    RecappClient::new(ClientConfig {
        api: api.to_string(),
        token: token.map(str::to_string),
        timeout: Duration::from_secs(5),
        requests_per_second: 50,
    })
    .unwrap()
}

fn request(dir: &TempDir) -> SubmitRequest {
    let audio_path = dir.path().join("C7_forest_40.wav");
    std::fs::write(&audio_path, b"RIFF0000WAVE").unwrap();
    SubmitRequest {
        audio_path,
        language: "de".to_string(),
        additional_vocab: vec!["Wald".to_string()],
        priority: None,
    }
}

#[tokio::test]
async fn test_submit_sends_multipart_and_returns_id() {
    let api = spawn_remote().await;
    let dir = TempDir::new().unwrap();

    let id = client(&api, Some(TOKEN)).submit(&request(&dir)).await.unwrap();
    assert_eq!(id, "42");
}

#[tokio::test]
async fn test_submit_without_token_is_api_error() {
    let api = spawn_remote().await;
    let dir = TempDir::new().unwrap();

    let err = client(&api, None).submit(&request(&dir)).await.unwrap_err();
    assert!(matches!(err, ClientError::ApiError(401, _)));
    assert_eq!(err.classification(), "transport");
}

#[tokio::test]
async fn test_submit_unreadable_artifact() {
    let api = spawn_remote().await;
    let dir = TempDir::new().unwrap();
    let mut req = request(&dir);
    req.audio_path = dir.path().join("missing.wav");

    let err = client(&api, Some(TOKEN)).submit(&req).await.unwrap_err();
    assert!(matches!(err, ClientError::ArtifactError(_, _)));
}

#[tokio::test]
async fn test_list_and_get_jobs() {
    let api = spawn_remote().await;
    let client = client(&api, Some(TOKEN));

    let jobs = client.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "a");
    assert_eq!(jobs[1].id, "7");
    assert_eq!(jobs[1].status, "done");

    let job = client.get_job("a").await.unwrap();
    assert_eq!(job.status, "running");

    assert!(matches!(
        client.get_job("zzz").await,
        Err(ClientError::ApiError(404, _))
    ));
}

#[tokio::test]
async fn test_get_transcript() {
    let api = spawn_remote().await;
    let client = client(&api, Some(TOKEN));

    let payload = client.get_transcript("a").await.unwrap();
    assert!(payload.contains("Hello"));

    assert!(matches!(
        client.get_transcript("b").await,
        Err(ClientError::ApiError(500, _))
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}/api/v1", addr), None);
    assert!(matches!(
        client.list_jobs().await,
        Err(ClientError::NetworkError(_))
    ));
}

#[test]
fn test_zero_rate_is_configuration_error() {
    let result = RecappClient::new(ClientConfig {
        api: "http://localhost/api/v1".to_string(),
        token: None,
        timeout: Duration::from_secs(1),
        requests_per_second: 0,
    });
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}
