//! Reduce a loosely shaped `final_result` payload to one text value.
//!
//! The backend may return the final result as a bare string or as an object
//! carrying the text under one of several keys. Decoding first sorts the
//! payload into [`FinalResult`] and only then looks up keys, so every shape
//! has exactly one answer.

use serde_json::{Map, Value};

/// Keys checked on object payloads, highest priority first.
pub const TEXT_KEYS: [&str; 5] = ["result", "final", "text", "message", "output"];

/// Shape of a final-result payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinalResult<'a> {
    Text(&'a str),
    Object(&'a Map<String, Value>),
    Other,
}

impl<'a> From<&'a Value> for FinalResult<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(text) => FinalResult::Text(text),
            Value::Object(map) => FinalResult::Object(map),
            _ => FinalResult::Other,
        }
    }
}

/// Outcome of extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    /// The payload carried no recognised text field
    NoText,
}

impl Extracted {
    pub fn into_text(self) -> Option<String> {
        match self {
            Extracted::Text(text) => Some(text),
            Extracted::NoText => None,
        }
    }
}

/// Extract text from a `final_result` value.
pub fn extract(payload: &Value) -> Extracted {
    match FinalResult::from(payload) {
        FinalResult::Text(text) => Extracted::Text(text.to_string()),
        FinalResult::Object(map) => TEXT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|text| Extracted::Text(text.to_string()))
            .unwrap_or(Extracted::NoText),
        FinalResult::Other => Extracted::NoText,
    }
}

/// Extract text from a whole result response, reading its `final_result` field.
pub fn extract_final_result(response: &Value) -> Extracted {
    match response.get("final_result") {
        Some(payload) => extract(payload),
        None => Extracted::NoText,
    }
}
