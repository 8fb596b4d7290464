//! Result demultiplexer.
//!
//! Splits the relay's output into lines and classifies each line into a
//! verdict, summary or todo record. Classification is by key presence, first
//! match wins: `check` (with a non-empty `id`), then `summary`, then `todo`
//! (when it is an array). Anything else, including lines that are not JSON,
//! is dropped.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{CheckStatus, ResultRecord};
use crate::framing::Framer;

/// Status applied when the model answers with something other than
/// `pass`, `fail` or `warning`.
pub const FALLBACK_STATUS: CheckStatus = CheckStatus::Warning;

/// Incremental line splitter and classifier.
#[derive(Debug)]
pub struct LineDemultiplexer {
    framer: Framer,
}

impl Default for LineDemultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDemultiplexer {
    pub fn new() -> Self {
        Self {
            framer: Framer::lines(),
        }
    }

    /// Feed the next byte slice and collect the records it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ResultRecord> {
        self.framer.push(chunk);
        let mut records = Vec::new();
        while let Some(line) = self.framer.next_frame() {
            records.extend(classify(&line));
        }
        records
    }

    /// Classify a trailing line left without a newline at end of stream.
    pub fn finish(&mut self) -> Option<ResultRecord> {
        let rest = self.framer.finish()?;
        classify(&rest)
    }
}

/// Classify one line of output.
pub fn classify(line: &str) -> Option<ResultRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            debug!("Ignoring malformed result line: {}", err);
            return None;
        }
    };
    let object = value.as_object()?;

    if let Some(record) = verdict(object) {
        return Some(record);
    }
    if let Some(summary) = object.get("summary") {
        return Some(ResultRecord::Summary(text_of(summary)));
    }
    if let Some(Value::Array(items)) = object.get("todo") {
        return Some(ResultRecord::Todo(items.iter().map(text_of).collect()));
    }
    None
}

fn verdict(object: &Map<String, Value>) -> Option<ResultRecord> {
    let check = object.get("check")?;
    // Numeric ids are matched against the checklist by their decimal text.
    let id = match check.get("id")? {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(number) if number.as_f64() != Some(0.0) => number.to_string(),
        _ => return None,
    };

    let raw_status = check.get("status").and_then(Value::as_str).unwrap_or("");
    let status = CheckStatus::from_verdict(raw_status).unwrap_or_else(|| {
        warn!(
            "Check {} returned unexpected status {:?}; treating as {}",
            id,
            raw_status,
            FALLBACK_STATUS.as_str()
        );
        FALLBACK_STATUS
    });

    let summary = check.get("summary").map(text_of);

    Some(ResultRecord::Verdict {
        id,
        status,
        summary,
    })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
