//! Incremental text framing for streamed response bodies.
//!
//! Both sides of the relay read a body that arrives in arbitrary byte slices.
//! `Utf8Decoder` decodes those slices without ever re-decoding consumed bytes,
//! holding back an incomplete trailing code point until the next slice, and
//! `Framer` accumulates the decoded text and hands out delimiter-separated
//! frames.

use tracing::trace;

/// Delimiter between Server-Sent Events.
pub const EVENT_DELIMITER: &str = "\n\n";

/// Delimiter between newline-delimited JSON records.
pub const LINE_DELIMITER: &str = "\n";

/// Stateful UTF-8 decoder.
///
/// Invalid sequences are replaced with U+FFFD. A code point split across two
/// slices is emitted once the slice completing it arrives.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next slice, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut consumed = 0;

        while consumed < self.pending.len() {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + invalid;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Number of bytes held back waiting for the rest of a code point.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Accumulates decoded text and splits it into frames on a fixed delimiter.
#[derive(Debug)]
pub struct Framer {
    decoder: Utf8Decoder,
    buffer: String,
    delimiter: &'static str,
}

impl Framer {
    pub fn new(delimiter: &'static str) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            delimiter,
        }
    }

    /// Framer for Server-Sent Events (`\n\n` separated).
    pub fn events() -> Self {
        Self::new(EVENT_DELIMITER)
    }

    /// Framer for newline-delimited records.
    pub fn lines() -> Self {
        Self::new(LINE_DELIMITER)
    }

    /// Decode a byte slice and append it to the buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);
    }

    /// Take the next complete frame (without its delimiter), if any.
    pub fn next_frame(&mut self) -> Option<String> {
        let pos = self.buffer.find(self.delimiter)?;
        let frame = self.buffer[..pos].to_string();
        self.buffer.drain(..pos + self.delimiter.len());
        Some(frame)
    }

    /// Drain whatever is left once the input has ended.
    ///
    /// Returns `None` when the remainder is blank. Bytes of an unfinished
    /// code point are dropped.
    pub fn finish(&mut self) -> Option<String> {
        if self.decoder.pending_len() > 0 {
            trace!(
                "Dropping {} undecodable trailing bytes",
                self.decoder.pending_len()
            );
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}
