//! Fenced-block stripping and JSON decoding of model text.
//!
//! Models asked for JSON still sometimes answer with
//!
//! ~~~text
//! ```json
//! {"meaning": "..."}
//! ```
//! ~~~
//!
//! [`strip_fence`] removes such a wrapper (and nothing else); [`extract`] decodes what is
//! left. Field presence is checked separately by [`missing_fields`] so the executor can
//! decide whether to retry.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_+.\-]*[ \t]*\r?\n?(.*?)\r?\n?\s*```\s*$")
        .expect("fence pattern is valid")
});

/// Inner text of a fenced block, or the input unchanged when it is not fenced.
pub fn strip_fence(text: &str) -> &str {
    match FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Decode `raw` (fenced or not) into a JSON value. `None` means a hard parse failure.
pub fn extract(raw: &str) -> Option<Value> {
    let inner = strip_fence(raw).trim();
    match serde_json::from_str::<Value>(inner) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, len = raw.len(), "model text is not valid JSON");
            None
        }
    }
}

/// Required fields of `value` that do not hold non-blank text.
///
/// Required fields are read as strings by every call site, so a number, bool,
/// array or object in their place counts as missing just like `null` or absence.
/// A non-object value is missing every field.
pub fn missing_fields(value: &Value, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| match value.get(**field) {
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => true,
        })
        .map(|f| f.to_string())
        .collect()
}
