//! Integration tests for the HTTP surface, driving the router in-process
//! with `tower::ServiceExt::oneshot`. No external converter tools are
//! required: plain-text and CSV uploads exercise the full pipeline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use docmill_api::{app, AppState, EnvKeyProvider};
use docmill_core::HeuristicTokenizer;
use docmill_engine::{
    standard_registry, ConversionWorker, MemoryJobStore, Orchestrator, OrchestratorConfig,
    RateLimiter, WorkerConfig,
};

const BOUNDARY: &str = "----docmill-test-boundary";

fn test_app() -> Router {
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(standard_registry()),
        Arc::new(MemoryJobStore::new()),
        Arc::new(RateLimiter::new()),
        Arc::new(HeuristicTokenizer),
        OrchestratorConfig::default(),
    ));
    let handle = ConversionWorker::new(orchestrator.clone(), WorkerConfig::default()).start();
    let state = AppState {
        orchestrator,
        submitter: handle.submitter(),
        keys: Arc::new(EnvKeyProvider::from_env()),
    };
    // Keep the worker alive for the test process lifetime.
    std::mem::forget(handle);
    app(state, 1024 * 1024)
}

/// Hand-rolled multipart body: a `file` part plus an optional `options`
/// JSON part.
fn multipart_body(filename: &str, mime: &str, data: &[u8], options: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    if let Some(options) = options {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"options\"\r\n\r\n");
        body.extend_from_slice(options.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn convert_request(uri: &str, filename: &str, mime: &str, data: &[u8], options: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-api-key", "test-suite-key")
        .body(Body::from(multipart_body(filename, mime, data, options)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["extractors"].is_object());
}

#[tokio::test]
async fn test_sync_convert_plain_text() {
    let app = test_app();
    let response = app
        .oneshot(convert_request(
            "/api/v1/convert/sync",
            "notes.txt",
            "text/plain",
            b"one two three four five",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("x-ratelimit-remaining-minute"));
    assert!(response.headers().contains_key("x-ratelimit-reset-day"));

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let data = &json["data"];
    assert_eq!(data["state"], "completed");
    assert_eq!(data["document"]["kind"], "markup");
    assert_eq!(data["statistics"]["total_pages"], 1);
    assert_eq!(data["statistics"]["total_words"], 5);
    assert_eq!(data["content"]["chunks"][0]["index"], 0);
}

#[tokio::test]
async fn test_sync_convert_with_options() {
    let app = test_app();
    let text = "x".repeat(2400);
    let options = r#"{"chunk_strategy": "fixed", "chunk_size": 1000, "chunk_overlap": 100}"#;
    let response = app
        .oneshot(convert_request(
            "/api/v1/convert/sync",
            "big.txt",
            "text/plain",
            text.as_bytes(),
            Some(options),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["statistics"]["total_chunks"], 3);
    assert_eq!(json["data"]["content"]["chunks"][1]["strategy"], "fixed");
}

#[tokio::test]
async fn test_sync_convert_unsupported_extension() {
    let app = test_app();
    let response = app
        .oneshot(convert_request(
            "/api/v1/convert/sync",
            "mystery.xyz",
            "application/octet-stream",
            b"????",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    // Telemetry headers are present on rejections too
    assert!(response
        .headers()
        .contains_key("x-ratelimit-remaining-minute"));

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "UNSUPPORTED_FORMAT");
    assert!(json["error"]["message"].as_str().unwrap().contains("mystery.xyz"));
}

#[tokio::test]
async fn test_sync_convert_invalid_configuration() {
    let app = test_app();
    let response = app
        .oneshot(convert_request(
            "/api/v1/convert/sync",
            "a.txt",
            "text/plain",
            b"hello",
            Some(r#"{"chunk_size": 5}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_CONFIGURATION");
}

#[tokio::test]
async fn test_sync_convert_missing_file_part() {
    let app = test_app();
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/convert/sync")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_async_convert_and_poll() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(convert_request(
            "/api/v1/convert",
            "notes.txt",
            "text/plain",
            b"asynchronous conversion body",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();

    // Poll until terminal
    let mut last_state = String::new();
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/documents/{}/status", job_id))
                    .header("x-api-key", "test-suite-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        last_state = json["data"]["state"].as_str().unwrap().to_string();
        if last_state == "completed" || last_state == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(last_state, "completed");

    // Terminal job carries the same content shape as the sync path
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/documents/{}", job_id))
                .header("x-api-key", "test-suite-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["statistics"]["total_pages"], 1);
    assert!(json["data"]["content"]["pages"].is_array());
}

#[tokio::test]
async fn test_get_unknown_document_is_404() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/documents/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_rate_limit_status_endpoint() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/rate-limit/status")
                .header("x-api-key", "status-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["api_key_id"], "status-key");
    assert_eq!(json["data"]["limits"]["rpm"], 60);
    assert_eq!(json["data"]["remaining_minute"], 60);
}

#[tokio::test]
async fn test_csv_upload_produces_table_chunk() {
    let app = test_app();
    let response = app
        .oneshot(convert_request(
            "/api/v1/convert/sync",
            "people.csv",
            "text/csv",
            b"name,age\nAlice,30\nBob,25\n",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["document"]["kind"], "tabular");
    let chunk_text = json["data"]["content"]["chunks"][0]["text"].as_str().unwrap();
    assert!(chunk_text.contains("Alice"));
}
