//! Mapping of backend responses to display text.
//!
//! The backend has no fixed reply contract, so success bodies are sniffed in
//! a fixed order: `output[0].generated_text`, `output[0].text`, a bare JSON
//! string, and finally the serialized body itself.

use serde_json::Value;

use crate::backend::RawResponse;

pub const MAX_FALLBACK_CHARS: usize = 2000;

pub const CANCELLED_TEXT: &str = "⚠️ Request cancelled (newer request arrived).";
pub const NETWORK_ERROR_TEXT: &str = "⚠️ Network error or server error";
const ERROR_PREFIX: &str = "⚠️ Error: ";

/// A success response whose body is not JSON.
#[derive(Debug, thiserror::Error)]
#[error("malformed response body: {0}")]
pub struct MalformedBody(#[from] serde_json::Error);

/// Display text for a completed exchange.
///
/// Failing statuses always produce text. A success status with an
/// unparseable body is reported as [`MalformedBody`].
pub fn extract_reply(response: &RawResponse) -> Result<String, MalformedBody> {
    if !response.is_success() {
        return Ok(error_text(response));
    }
    let body: Value = serde_json::from_str(&response.body)?;
    Ok(success_text(&body))
}

fn error_text(response: &RawResponse) -> String {
    let message = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("error").and_then(truthy_text))
        .unwrap_or_else(|| response.status_text.clone());
    format!("{ERROR_PREFIX}{message}")
}

pub fn success_text(body: &Value) -> String {
    let first = body
        .get("output")
        .and_then(|output| output.get(0));

    if let Some(text) = first.and_then(|f| f.get("generated_text")).and_then(truthy_text) {
        return text;
    }
    if let Some(text) = first.and_then(|f| f.get("text")).and_then(truthy_text) {
        return text;
    }
    if let Value::String(s) = body {
        return s.clone();
    }
    truncated_json(body)
}

fn truncated_json(body: &Value) -> String {
    body.to_string().chars().take(MAX_FALLBACK_CHARS).collect()
}

/// Text for a value that counts as present: `null`, `false`, `0` and `""`
/// do not.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
