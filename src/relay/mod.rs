//! Server-Sent-Events to newline-delimited JSON transcoder.
//!
//! The upstream sends `data:` events separated by a blank line, each carrying
//! a JSON envelope with an incremental text delta, and ends with a literal
//! `[DONE]` event. The relay forwards only the delta text, in arrival order,
//! with nothing added. The model is instructed to write newline-delimited
//! JSON, so the concatenated deltas form the record stream the client reads.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tracing::debug;

use crate::api::ChatCompletionChunk;
use crate::framing::Framer;

/// Literal payload marking the logical end of the upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream stream failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Outcome of processing a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Delta text to forward.
    Text(String),
    /// The termination sentinel.
    Done,
    /// Nothing to forward (comment, blank, malformed or empty delta).
    Ignored,
}

/// Interpret one raw event (the text between two blank-line delimiters).
pub fn parse_event(raw: &str) -> SseEvent {
    let event = raw.trim();
    let Some(data) = event.strip_prefix(DATA_PREFIX) else {
        return SseEvent::Ignored;
    };
    let data = data.trim_start();
    if data.is_empty() {
        return SseEvent::Ignored;
    }
    if data == DONE_SENTINEL {
        return SseEvent::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk.into_text().map_or(SseEvent::Ignored, SseEvent::Text),
        Err(err) => {
            debug!("Dropping malformed upstream event: {}", err);
            SseEvent::Ignored
        }
    }
}

/// Incremental transcoder state for one upstream response.
#[derive(Debug)]
pub struct SseTranscoder {
    framer: Framer,
    done: bool,
}

impl Default for SseTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseTranscoder {
    pub fn new() -> Self {
        Self {
            framer: Framer::events(),
            done: false,
        }
    }

    /// Whether the termination sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed the next byte slice and collect the text it completes.
    ///
    /// Once the sentinel is reached nothing further is produced, including
    /// events already sitting in the buffer behind it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }

        self.framer.push(chunk);
        while let Some(event) = self.framer.next_frame() {
            match parse_event(&event) {
                SseEvent::Text(text) => out.push(text),
                SseEvent::Done => {
                    self.done = true;
                    break;
                }
                SseEvent::Ignored => {}
            }
        }
        out
    }

    /// Process a trailing partial event when the upstream ends without `[DONE]`.
    pub fn finish(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        self.done = true;

        let rest = self.framer.finish()?;
        match parse_event(&rest) {
            SseEvent::Text(text) => Some(text),
            SseEvent::Done | SseEvent::Ignored => None,
        }
    }
}

/// Transcode an upstream byte stream into the plain record stream.
///
/// Text is yielded as soon as each event completes. A transport error ends
/// the stream with that error.
pub fn transcode<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, RelayError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<RelayError>,
{
    async_stream::try_stream! {
        let mut transcoder = SseTranscoder::new();
        let mut forwarded = 0usize;
        futures_util::pin_mut!(upstream);

        while let Some(chunk) = upstream.next().await {
            let chunk = chunk.map_err(Into::<RelayError>::into)?;
            for text in transcoder.push(&chunk) {
                forwarded += text.len();
                yield Bytes::from(text);
            }
            if transcoder.is_done() {
                debug!("Upstream sent {}; closing relay stream", DONE_SENTINEL);
                break;
            }
        }

        if let Some(text) = transcoder.finish() {
            forwarded += text.len();
            yield Bytes::from(text);
        }

        debug!("Relay stream finished after {} bytes", forwarded);
    }
}
