//! Delta extraction from frame payloads.
//!
//! A payload that is not valid JSON (keepalives, partial buffers) is skipped
//! and the stream continues. Only a payload that parses AND carries an error
//! field is fatal.

use serde::Deserialize;
use serde_json::Value;

use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Incremental answer text (may be empty)
    Text(String),
    /// Explicit error reported inside the stream
    Error(String),
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Value>,
}

/// Decode one frame. `None` means the frame contributes nothing.
pub fn extract(frame: &Frame) -> Option<Delta> {
    let value: Value = match serde_json::from_str(frame.payload()) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!(error = %e, payload = frame.payload(), "skipping unparseable frame");
            return None;
        }
    };
    if !value.is_object() {
        return None;
    }
    if let Some(message) = value.get("error").and_then(error_message) {
        return Some(Delta::Error(message));
    }

    let record = match Record::deserialize(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::trace!(error = %e, "skipping frame with unexpected shape");
            return None;
        }
    };

    let text = record.candidates.first()?.content.as_ref()?.parts.first()?.get("text")?.as_str()?;
    Some(Delta::Text(text.to_string()))
}

/// Message carried by a truthy `error` field.
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => match obj.get("message").and_then(Value::as_str) {
            Some(msg) if !msg.is_empty() => Some(msg.to_string()),
            _ => Some(error.to_string()),
        },
        other => Some(other.to_string()),
    }
}
