//! Error responses of the relay API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("OPENAI_API_KEY missing")]
    MissingApiKey,
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Files and checks are required")]
    MissingInputs,
    #[error("Invalid request: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidJson | Self::MissingInputs | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
