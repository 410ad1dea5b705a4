//! Response normalisation: model reply text → line items.
//!
//! The prompt tells the model not to wrap its answer in a code fence; models
//! do it anyway. [`strip_code_fences`] removes that wrapper, and
//! [`normalize`] parses what remains, strictly. There is no repair step: a
//! reply that is not a JSON array of objects is reported as
//! [`EstimatorError::MalformedResponse`] with the raw text attached so the
//! user can see what the model actually said.

use crate::error::EstimatorError;
use crate::output::LineItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// Opening fence with an optional language tag (```json, ```JSON, ```), at the very start.
static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").unwrap());

// Closing fence at the very end.
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```$").unwrap());

/// Remove a leading and a trailing markdown code fence plus surrounding
/// whitespace (and a leading byte-order mark).
///
/// Text without fences only loses its outer whitespace, so the function is
/// idempotent: `strip_code_fences(&strip_code_fences(s)) == strip_code_fences(s)`.
pub fn strip_code_fences(input: &str) -> String {
    let mut s = input.trim_start_matches('\u{FEFF}').trim();
    loop {
        let before = s;
        if let Some(m) = RE_LEADING_FENCE.find(s) {
            s = s[m.end()..].trim();
        }
        if let Some(m) = RE_TRAILING_FENCE.find(s) {
            s = s[..m.start()].trim();
        }
        if s.len() == before.len() {
            break;
        }
    }
    s.to_string()
}

/// Parse the model's reply into line items, in the order the model gave them.
///
/// Field names and value types are not checked; see [`LineItem`].
pub fn normalize(raw: &str) -> Result<Vec<LineItem>, EstimatorError> {
    let malformed = |detail: String| EstimatorError::MalformedResponse {
        detail,
        raw: raw.to_string(),
    };

    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| malformed(e.to_string()))?;

    let Value::Array(entries) = value else {
        return Err(malformed(format!(
            "expected a JSON array, got {}",
            json_kind(&value)
        )));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Object(map) => Ok(LineItem::from_map(map)),
            other => Err(malformed(format!(
                "entry {} is {}, expected an object",
                i + 1,
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
