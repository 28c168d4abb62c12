//! docmill-api — HTTP surface for the conversion engine.
//!
//! Routes (all under `/api/v1` except health):
//! - `POST /api/v1/convert/sync` — multipart upload, inline conversion
//! - `POST /api/v1/convert` — multipart upload, background job
//! - `GET /api/v1/documents/:id` — job record (full content once terminal)
//! - `GET /api/v1/documents/:id/status` — lightweight state poll
//! - `GET /api/v1/rate-limit/status` — caller's quota snapshot
//! - `GET /health` — liveness + extractor health
//!
//! Every payload is wrapped in a success/error envelope; error envelopes
//! carry a stable `code` and, for rate-limit rejections, `retry_after`
//! seconds. Responses on the `/api/v1` surface carry rate-limit telemetry
//! headers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use docmill_core::defaults::{CORS_MAX_AGE_SECS, RATE_LIMIT_RPD, RATE_LIMIT_RPM};
use docmill_core::{ApiKeyProvider, ApiKeyRecord, ConversionJob, ConversionOptions, JobState};
use docmill_engine::{
    ConversionRequest, JobSubmitter, Orchestrator, QuotaSnapshot,
};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful
/// for log correlation and debugging production incidents.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// API KEY RESOLUTION
// =============================================================================

/// Key provider backed by the `API_KEYS` environment variable.
///
/// `API_KEYS` holds comma-separated `id:rpm:rpd` entries (rpm/rpd
/// optional). With no entries configured the server runs open: any caller
/// is accepted under its presented key id (or `anonymous`) with the
/// default limits. With entries configured, unknown keys are rejected.
pub struct EnvKeyProvider {
    keys: HashMap<String, ApiKeyRecord>,
    default_rpm: u32,
    default_rpd: u32,
}

impl EnvKeyProvider {
    pub fn from_env() -> Self {
        let default_rpm = std::env::var("RATE_LIMIT_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(RATE_LIMIT_RPM);
        let default_rpd = std::env::var("RATE_LIMIT_RPD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(RATE_LIMIT_RPD);

        let raw = std::env::var("API_KEYS").unwrap_or_default();
        Self::parse(&raw, default_rpm, default_rpd)
    }

    fn parse(raw: &str, default_rpm: u32, default_rpd: u32) -> Self {
        let mut keys = HashMap::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.split(':');
            let id = match parts.next() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };
            let rpm = parts
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_rpm);
            let rpd = parts
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_rpd);
            keys.insert(id.clone(), ApiKeyRecord { id, rpm, rpd });
        }
        Self {
            keys,
            default_rpm,
            default_rpd,
        }
    }

    /// Number of configured keys (0 = open mode).
    pub fn configured_keys(&self) -> usize {
        self.keys.len()
    }
}

#[async_trait]
impl ApiKeyProvider for EnvKeyProvider {
    async fn resolve(&self, raw_key: &str) -> docmill_core::Result<Option<ApiKeyRecord>> {
        if self.keys.is_empty() {
            // Open mode: every caller gets the default limits, keyed by
            // the presented credential so quotas stay per caller.
            let id = if raw_key.is_empty() {
                "anonymous".to_string()
            } else {
                raw_key.to_string()
            };
            return Ok(Some(ApiKeyRecord {
                id,
                rpm: self.default_rpm,
                rpd: self.default_rpd,
            }));
        }
        Ok(self.keys.get(raw_key).cloned())
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub submitter: JobSubmitter,
    pub keys: Arc<dyn ApiKeyProvider>,
}

// =============================================================================
// ERROR HANDLING & ENVELOPE
// =============================================================================

/// API-level error: the core taxonomy plus HTTP-surface concerns.
#[derive(Debug)]
pub enum ApiError {
    Core(docmill_core::Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
}

impl From<docmill_core::Error> for ApiError {
    fn from(err: docmill_core::Error) -> Self {
        ApiError::Core(err)
    }
}

/// HTTP status for a stable error code.
fn status_for_code(code: &str) -> StatusCode {
    match code {
        "INVALID_CONFIGURATION" => StatusCode::BAD_REQUEST,
        "UNSUPPORTED_FORMAT" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        "FILE_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
        "RATE_LIMIT_EXCEEDED" => StatusCode::TOO_MANY_REQUESTS,
        "EXTRACTOR_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        "PROCESSING_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
        "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the error envelope body.
fn error_body(code: &str, message: &str, retry_after: Option<u64>) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(retry_after) = retry_after {
        error["retry_after"] = json!(retry_after);
    }
    json!({ "success": false, "error": error })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message, retry_after) = match &self {
            ApiError::Core(err) => {
                // Internal detail is logged, never exposed.
                let message = match err {
                    docmill_core::Error::Internal(detail) => {
                        tracing::error!(error = %detail, "Internal error");
                        "internal error".to_string()
                    }
                    docmill_core::Error::Io(detail) => {
                        tracing::error!(error = %detail, "I/O error");
                        "internal error".to_string()
                    }
                    other => other.to_string(),
                };
                (err.code(), message, err.retry_after())
            }
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            ApiError::NotFound(msg) => ("NOT_FOUND", msg.clone(), None),
            ApiError::BadRequest(msg) => ("INVALID_CONFIGURATION", msg.clone(), None),
        };

        let status = status_for_code(code);
        let body = error_body(code, &message, retry_after);
        (status, Json(body)).into_response()
    }
}

/// Success envelope.
fn success_body(data: serde_json::Value) -> serde_json::Value {
    json!({ "success": true, "data": data })
}

/// Rate-limit telemetry headers attached to every `/api/v1` response.
fn quota_headers(snapshot: &QuotaSnapshot) -> [(&'static str, String); 4] {
    [
        ("x-ratelimit-remaining-minute", snapshot.remaining_minute.to_string()),
        ("x-ratelimit-remaining-day", snapshot.remaining_day.to_string()),
        ("x-ratelimit-reset-minute", snapshot.minute_reset.to_string()),
        ("x-ratelimit-reset-day", snapshot.day_reset.to_string()),
    ]
}

fn with_quota(mut response: Response, snapshot: &QuotaSnapshot) -> Response {
    let headers = response.headers_mut();
    for (name, value) in quota_headers(snapshot) {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}

// =============================================================================
// RESPONSE SHAPES
// =============================================================================

/// Full job payload: document metadata, content, statistics.
fn job_body(job: &ConversionJob) -> serde_json::Value {
    let mut body = json!({
        "job_id": job.id,
        "state": job.state,
        "progress_percent": job.progress_percent,
        "document": {
            "filename": job.document.filename,
            "kind": job.document.detected_kind,
            "size_bytes": job.document.size_bytes,
            "page_count": job.output.as_ref().map(|o| o.stats.total_pages),
        },
        "submitted_at": job.submitted_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
    });

    if let Some(output) = &job.output {
        body["content"] = json!({
            "pages": output.pages,
            "chunks": output.chunks,
        });
        body["statistics"] = json!(output.stats);
    }
    if let Some(error) = &job.error {
        body["error"] = json!(error);
    }
    body
}

// =============================================================================
// UPLOAD INTAKE
// =============================================================================

struct Upload {
    filename: String,
    declared_mime: String,
    data: Vec<u8>,
    options: ConversionOptions,
}

/// Read the multipart upload: a required `file` part and an optional
/// `options` JSON part.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut filename = None;
    let mut declared_mime = None;
    let mut data = None;
    let mut options = ConversionOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                filename = field.file_name().map(|s| s.to_string());
                declared_mime = field.content_type().map(|s| s.to_string());
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("failed to read file: {}", e)))?
                        .to_vec(),
                );
            }
            Some("options") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read options: {}", e))
                })?;
                options = serde_json::from_str(&text).map_err(|e| {
                    ApiError::Core(docmill_core::Error::InvalidConfiguration(format!(
                        "options is not valid JSON: {}",
                        e
                    )))
                })?;
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("missing 'file' part".to_string()))?;
    Ok(Upload {
        filename: filename.unwrap_or_else(|| "upload".to_string()),
        declared_mime: declared_mime.unwrap_or_default(),
        data,
        options,
    })
}

/// Resolve the caller's API key record from the `x-api-key` header.
async fn resolve_key(state: &AppState, headers: &HeaderMap) -> Result<ApiKeyRecord, ApiError> {
    let raw = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    state
        .keys
        .resolve(raw)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown API key".to_string()))
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let extractors = state.orchestrator.registry().health_check_all().await;
    let extractors: HashMap<String, bool> = extractors
        .into_iter()
        .map(|(family, healthy)| (family.to_string(), healthy))
        .collect();

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "extractors": extractors,
    }))
}

async fn convert_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let key = resolve_key(&state, &headers).await?;
    let upload = read_upload(multipart).await?;

    let result = state
        .orchestrator
        .convert_sync(ConversionRequest {
            api_key: key.clone(),
            filename: upload.filename,
            declared_mime: upload.declared_mime,
            data: upload.data,
            options: upload.options,
        })
        .await;

    let snapshot = state.orchestrator.limiter().peek(&key, Utc::now());
    let response = match result {
        Ok(job) if job.state == JobState::Completed => {
            (StatusCode::OK, Json(success_body(job_body(&job)))).into_response()
        }
        Ok(job) => {
            // Terminal failure: error envelope with the job's stable code.
            let error = job.error.clone().unwrap_or(docmill_core::JobError {
                code: "INTERNAL_ERROR".to_string(),
                message: "job ended without a recorded error".to_string(),
            });
            let status = status_for_code(&error.code);
            let mut body = error_body(&error.code, &error.message, None);
            body["error"]["job_id"] = json!(job.id);
            (status, Json(body)).into_response()
        }
        // Rejected before admission; the envelope still carries quota.
        Err(err) => ApiError::from(err).into_response(),
    };
    Ok(with_quota(response, &snapshot))
}

async fn convert_async(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let key = resolve_key(&state, &headers).await?;
    let upload = read_upload(multipart).await?;

    let result = state
        .orchestrator
        .submit(ConversionRequest {
            api_key: key.clone(),
            filename: upload.filename,
            declared_mime: upload.declared_mime,
            data: upload.data,
            options: upload.options,
        })
        .await;

    let snapshot = state.orchestrator.limiter().peek(&key, Utc::now());
    let response = match result {
        Ok(job) => {
            state.submitter.submit(job.id).await?;
            let body = success_body(json!({
                "job_id": job.id,
                "state": job.state,
            }));
            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    };
    Ok(with_quota(response, &snapshot))
}

async fn get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let key = resolve_key(&state, &headers).await?;
    let job = state
        .orchestrator
        .store()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("document job {} not found", id)))?;

    let snapshot = state.orchestrator.limiter().peek(&key, Utc::now());
    let response = Json(success_body(job_body(&job))).into_response();
    Ok(with_quota(response, &snapshot))
}

async fn get_document_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let key = resolve_key(&state, &headers).await?;
    let job = state
        .orchestrator
        .store()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("document job {} not found", id)))?;

    let snapshot = state.orchestrator.limiter().peek(&key, Utc::now());
    let body = success_body(json!({
        "job_id": job.id,
        "state": job.state,
        "progress_percent": job.progress_percent,
    }));
    Ok(with_quota(Json(body).into_response(), &snapshot))
}

async fn rate_limit_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let key = resolve_key(&state, &headers).await?;
    let snapshot = state.orchestrator.limiter().peek(&key, Utc::now());

    let body = success_body(json!({
        "api_key_id": key.id,
        "limits": { "rpm": key.rpm, "rpd": key.rpd },
        "remaining_minute": snapshot.remaining_minute,
        "remaining_day": snapshot.remaining_day,
        "minute_reset": snapshot.minute_reset,
        "day_reset": snapshot.day_reset,
    }));
    Ok(with_quota(Json(body).into_response(), &snapshot))
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS`
/// environment variable. Unset means same-host tooling only (localhost).
pub fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router with the standard middleware stack.
pub fn app(state: AppState, max_upload_bytes: u64) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_allowed_origins()))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-api-key"),
        ])
        .max_age(std::time::Duration::from_secs(CORS_MAX_AGE_SECS));

    // Multipart framing overhead on top of the document ceiling.
    let body_limit = (max_upload_bytes as usize).saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/convert", post(convert_async))
        .route("/api/v1/convert/sync", post(convert_sync))
        .route("/api/v1/documents/:id", get(get_document))
        .route("/api/v1/documents/:id/status", get(get_document_status))
        .route("/api/v1/rate-limit/status", get(rate_limit_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
