//! Client for the upstream chat-completion service.
//!
//! One streaming request is made per compliance run. The response is handed
//! back unread so the relay can transcode it as it arrives.

mod types;

pub use types::ChatCompletionChunk;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::config::RelayConfig;
use types::{ChatCompletionRequest, ChatMessage};

/// Connect timeout for upstream requests. Streaming reads are not bounded.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Message used when the upstream fails without a body.
pub const UPSTREAM_FALLBACK_ERROR: &str = "OpenAI request failed";

/// Default User-Agent (from Cargo.toml)
const USER_AGENT: &str = concat!("precheck/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("OPENAI_API_KEY missing")]
    MissingApiKey,
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
}

/// Streaming chat-completion client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl ChatClient {
    /// Create a new client from relay configuration.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.completions_url()?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Whether an API key is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a streaming chat request with one system and one user message.
    ///
    /// Returns the response only when the upstream answered with a success
    /// status; its body has not been read yet.
    pub async fn stream_chat(
        &self,
        system: &str,
        user: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;

        let body = ChatCompletionRequest {
            model: &self.model,
            stream: true,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let request_id = Uuid::new_v4().to_string();
        debug!("=== Chat Completion Request ===");
        debug!("URL: {}", self.endpoint);
        debug!("Model: {}", self.model);
        debug!("User message length: {}", user.len());

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("x-request-id", &request_id)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("=== Chat Completion Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Chat completion request failed with status {}: {}",
                status, error_text
            );
            let message = if error_text.trim().is_empty() {
                UPSTREAM_FALLBACK_ERROR.to_string()
            } else {
                error_text
            };
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};

    #[test]
    fn test_client_endpoint() {
        let config = RelayConfig::new(
            Some("sk-test".to_string()),
            "http://localhost:9000/v1",
            DEFAULT_MODEL,
            1.0,
        )
        .unwrap();
        let client = ChatClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:9000/v1/chat/completions"
        );
        assert!(client.has_credentials());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_sending() {
        let config = RelayConfig::new(None, DEFAULT_BASE_URL, DEFAULT_MODEL, 1.0).unwrap();
        let client = ChatClient::new(&config).unwrap();
        assert!(!client.has_credentials());

        let err = client.stream_chat("system", "user").await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingApiKey));
        assert_eq!(err.to_string(), "OPENAI_API_KEY missing");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatCompletionRequest {
            model: "m",
            stream: true,
            temperature: 1.0,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "m",
                "stream": true,
                "temperature": 1.0,
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }
}
