//! Domain types shared across modules.
//!
//! These are used by the relay (request assembly), the demultiplexer
//! (verdict records) and the client (run state, reports). Keeping them here
//! avoids circular dependencies between those modules.

use serde::{Deserialize, Serialize};

/// Default MIME type for uploaded documents whose declared type is empty.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// One compliance rule sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prompt: String,
}

/// File payload as it travels from the client to the relay.
///
/// `content` is the standard base64 encoding of the raw file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFile {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub content: String,
}

impl EncodedFile {
    /// Declared MIME type, falling back to `application/pdf` when empty.
    pub fn effective_mime_type(&self) -> &str {
        if self.mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            &self.mime_type
        }
    }
}

/// Request body for `POST /run-checks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunChecksRequest {
    pub files: Vec<EncodedFile>,
    pub checks: Vec<Check>,
}

/// Per-check status as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Idle,
    Processing,
    Pass,
    Fail,
    Warning,
}

impl CheckStatus {
    /// Parse one of the three terminal verdict values the model may emit.
    pub fn from_verdict(value: &str) -> Option<Self> {
        match value {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
        }
    }
}

/// One classified line of the relay's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRecord {
    /// Verdict for a single check.
    Verdict {
        id: String,
        status: CheckStatus,
        summary: Option<String>,
    },
    /// Overall assessment text.
    Summary(String),
    /// Ordered action items.
    Todo(Vec<String>),
}
