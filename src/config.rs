//! Relay configuration.

use anyhow::{Context, Result};
use url::Url;

/// Default OpenAI-compatible API base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Default listen address for `precheck serve`.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Settings for the upstream chat-completion call.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Secret key. Absence is only reported when a run is requested.
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model: String,
    pub temperature: f32,
}

impl RelayConfig {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: parse_base_url(base_url)?,
            model: model.into(),
            temperature,
        })
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> Result<Url> {
        self.base_url
            .join("chat/completions")
            .with_context(|| format!("Failed to build completions URL from: {}", self.base_url))
    }
}

/// Parse a base URL so that relative joins append to its path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("Invalid base URL: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let config = RelayConfig::new(None, "https://api.openai.com/v1", DEFAULT_MODEL, 1.0).unwrap();
        assert_eq!(
            config.completions_url().unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );

        let config = RelayConfig::new(None, DEFAULT_BASE_URL, DEFAULT_MODEL, 1.0).unwrap();
        assert_eq!(
            config.completions_url().unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config =
            RelayConfig::new(Some("  ".to_string()), DEFAULT_BASE_URL, DEFAULT_MODEL, 1.0).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(parse_base_url("not a url").is_err());
    }
}
