//! HTTP surface of the relay.
//!
//! `POST /run-checks` assembles the prompt, opens one streaming upstream
//! request and answers with the transcoded record stream. Failures before the
//! upstream stream opens are reported as a single JSON error body.

mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ChatClient, UpstreamError};
use crate::assembler::{build_user_message, SYSTEM_PROMPT};
use crate::domain::{Check, RunChecksRequest};
use crate::relay;

/// Content type of the transcoded record stream.
pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Header carrying the relay-assigned run id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatClient>,
    pub checks: Arc<Vec<Check>>,
}

impl AppState {
    pub fn new(chat: ChatClient, checks: Vec<Check>) -> Self {
        Self {
            chat: Arc::new(chat),
            checks: Arc::new(checks),
        }
    }
}

/// Build the relay router.
///
/// Request bodies are not size-limited: each file travels inline as base64,
/// so a single filing can be many megabytes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run-checks", post(run_checks))
        .layer(DefaultBodyLimit::disable())
        .route("/checks", get(list_checks))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the configured checks against the posted files.
pub async fn run_checks(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    if !state.chat.has_credentials() {
        return Err(ApiError::MissingApiKey);
    }

    let request = parse_request(&body)?;
    let run_id = Uuid::new_v4();
    info!(
        "Run {}: {} file(s), {} check(s)",
        run_id,
        request.files.len(),
        request.checks.len()
    );

    let user_message = build_user_message(&request.checks, &request.files)
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?;

    let upstream = state
        .chat
        .stream_chat(SYSTEM_PROMPT, &user_message)
        .await
        .map_err(|err| {
            warn!("Run {}: upstream call failed: {}", run_id, err);
            match err {
                UpstreamError::MissingApiKey => ApiError::MissingApiKey,
                other => ApiError::Upstream(other.to_string()),
            }
        })?;

    let stream = relay::transcode(upstream.bytes_stream());

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(STREAM_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&run_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}

/// Validate a request body.
///
/// Syntax is checked first, then the presence of both arrays and at least one
/// file, then the shape of each entry.
fn parse_request(body: &[u8]) -> Result<RunChecksRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;

    let has_files = value
        .get("files")
        .and_then(Value::as_array)
        .is_some_and(|files| !files.is_empty());
    let has_checks = value.get("checks").is_some_and(Value::is_array);
    if !has_files || !has_checks {
        return Err(ApiError::MissingInputs);
    }

    serde_json::from_value(value).map_err(|err| ApiError::InvalidPayload(err.to_string()))
}

async fn list_checks(State(state): State<AppState>) -> Json<Vec<Check>> {
    Json(state.checks.as_ref().clone())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
