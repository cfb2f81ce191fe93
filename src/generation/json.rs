//! Tolerant JSON recovery from model output
//!
//! Models wrap JSON in prose, markdown fences, or both. Recovery runs in
//! two steps:
//!
//! 1. Strip one fenced code block if present, preferring a `json` fence,
//!    and parse the result directly
//! 2. Otherwise slice from the first `{` or `[` to the last matching closer
//!    and parse that

use serde_json::Value;

const FENCE: &str = "```";

/// JSON recovery errors
#[derive(Debug, thiserror::Error)]
pub enum JsonRecoveryError {
    #[error("no JSON found in model output")]
    NoJson,

    #[error("invalid JSON in model output: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Recover a JSON value from noisy text
pub fn extract_json(text: &str) -> Result<Value, JsonRecoveryError> {
    let candidate = strip_fence(text).unwrap_or(text).trim();

    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok(value);
    }

    let slice = bracket_slice(candidate).ok_or(JsonRecoveryError::NoJson)?;
    serde_json::from_str(slice).map_err(JsonRecoveryError::from)
}

/// Body of the preferred fenced block, if any
fn strip_fence(text: &str) -> Option<&str> {
    let mut first: Option<&str> = None;
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let (label, body_start) = match after_open.find('\n') {
            Some(newline) => (after_open[..newline].trim(), newline + 1),
            // Single-line fence: ```{"a":1}```
            None => ("", 0),
        };
        let body_and_tail = &after_open[body_start..];
        let Some(close) = body_and_tail.find(FENCE) else {
            break;
        };
        let body = &body_and_tail[..close];

        if label.eq_ignore_ascii_case("json") {
            return Some(body);
        }
        first.get_or_insert(body);
        rest = &body_and_tail[close + FENCE.len()..];
    }

    first
}

/// From the first opening bracket to the last matching closing bracket
fn bracket_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// First `max_chars` characters of `text`, for error messages
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
