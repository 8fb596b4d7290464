//! Chat-completion request and streaming chunk types.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Streaming chat-completion request body.
#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
    pub temperature: f32,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// One `data:` payload of the upstream event stream.
///
/// Only the first entry of `choices` is decoded; the rest are skipped
/// unparsed so a malformed trailing choice cannot drop the event.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(rename = "choices", default, deserialize_with = "first_choice")]
    choice: Option<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice's delta, if any.
    pub fn into_text(self) -> Option<String> {
        let text = self
            .choice?
            .delta?
            .content?
            .into_text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn first_choice<'de, D>(deserializer: D) -> Result<Option<ChunkChoice>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FirstChoiceVisitor;

    impl<'de> Visitor<'de> for FirstChoiceVisitor {
        type Value = Option<ChunkChoice>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a sequence of choices")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let first = seq.next_element::<ChunkChoice>()?;
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(first)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(FirstChoiceVisitor)
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<DeltaMessage>,
}

#[derive(Debug, Deserialize)]
struct DeltaMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Single(ContentPart),
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts.into_iter().map(ContentPart::into_text).collect(),
            Self::Single(part) => part.into_text(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Inline(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        text: Option<String>,
    },
    Other(IgnoredAny),
}

impl ContentPart {
    fn into_text(self) -> String {
        match self {
            Self::Inline(text) => text,
            Self::Typed { kind, text } if kind == "text" => text.unwrap_or_default(),
            Self::Typed { .. } | Self::Other(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(json: &str) -> Option<String> {
        serde_json::from_str::<ChatCompletionChunk>(json)
            .unwrap()
            .into_text()
    }

    #[test]
    fn test_string_delta() {
        assert_eq!(
            text_of(r#"{"choices":[{"delta":{"content":"hello"}}]}"#).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_fragment_list_delta() {
        let json = r#"{"choices":[{"delta":{"content":[
            "a",
            {"type":"text","text":"b"},
            {"type":"image_url","image_url":{"url":"x"}},
            {"type":"text"},
            7,
            "c"
        ]}}]}"#;
        assert_eq!(text_of(json).as_deref(), Some("abc"));
    }

    #[test]
    fn test_single_fragment_delta() {
        assert_eq!(
            text_of(r#"{"choices":[{"delta":{"content":{"type":"text","text":"x"}}}]}"#).as_deref(),
            Some("x")
        );
        assert_eq!(
            text_of(r#"{"choices":[{"delta":{"content":{"type":"refusal","text":"x"}}}]}"#),
            None
        );
    }

    #[test]
    fn test_empty_or_missing_delta() {
        assert_eq!(text_of(r#"{"choices":[]}"#), None);
        assert_eq!(text_of(r#"{"choices":[{"delta":{}}]}"#), None);
        assert_eq!(text_of(r#"{"choices":[{"delta":{"content":null}}]}"#), None);
        assert_eq!(text_of(r#"{"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(text_of(r#"{"choices":[{"finish_reason":"stop"}]}"#), None);
        assert_eq!(text_of(r#"{"id":"chatcmpl-1"}"#), None);
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let json = r#"{"choices":[{"delta":{"content":"one"}},{"delta":{"content":"two"}}]}"#;
        assert_eq!(text_of(json).as_deref(), Some("one"));
    }

    #[test]
    fn test_malformed_later_choice_keeps_first() {
        let json = r#"{"choices":[{"delta":{"content":"one"}},{"delta":{"content":5}},7]}"#;
        assert_eq!(text_of(json).as_deref(), Some("one"));
        assert_eq!(text_of(r#"{"choices":null}"#), None);
    }
}
