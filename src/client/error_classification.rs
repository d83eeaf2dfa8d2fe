//! Error classification logic
//!
//! Turns an opaque failure into an [`ErrorClassification`]. Extraction prefers, in order:
//! - a structured provider error object (`{"error": {"code", "message", "status"}}`)
//! - a generic error with a status and a message
//! - the stringified error
//!
//! Classification never fails; missing structure falls back to "unknown" values.

use serde_json::Value;

use crate::transport::TransportError;
use crate::Error;

const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";
const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Derived view of one failure. Created fresh per failure, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub is_quota_exhausted: bool,
    pub is_rate_limit_retryable: bool,
    pub status_code: Option<u16>,
    pub provider_status_tag: Option<String>,
    pub display_message: String,
}

impl ErrorClassification {
    /// Classification for a failure with no recognisable structure.
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_quota_exhausted: false,
            is_rate_limit_retryable: false,
            status_code: None,
            provider_status_tag: None,
            display_message: if message.trim().is_empty() {
                UNKNOWN_MESSAGE.to_string()
            } else {
                message
            },
        }
    }
}

/// Raw facts pulled out of an error before rules are applied.
#[derive(Debug, Default)]
struct ProviderFailure {
    status_code: Option<u16>,
    status_tag: Option<String>,
    message: Option<String>,
}

/// Classify a crate error.
pub fn classify(err: &Error) -> ErrorClassification {
    let failure = match err {
        Error::Remote {
            status,
            message,
            body,
        } => extract_remote(*status, message, body),
        Error::Transport(TransportError::Http(e)) => ProviderFailure {
            status_code: e.status().map(|s| s.as_u16()),
            status_tag: None,
            message: Some(e.to_string()),
        },
        other => ProviderFailure {
            message: Some(other.to_string()),
            ..Default::default()
        },
    };
    apply_rules(failure)
}

/// Classify a JSON error value, e.g. an `error` frame received mid-stream.
pub fn classify_value(value: &Value) -> ErrorClassification {
    let failure = extract_structured(value)
        .or_else(|| extract_generic(value))
        .unwrap_or_else(|| ProviderFailure {
            message: Some(value.to_string()),
            ..Default::default()
        });
    apply_rules(failure)
}

/// Classify already-extracted facts.
pub fn classify_parts(
    status_code: Option<u16>,
    provider_status_tag: Option<&str>,
    message: &str,
) -> ErrorClassification {
    apply_rules(ProviderFailure {
        status_code,
        status_tag: provider_status_tag.map(str::to_string),
        message: Some(message.to_string()),
    })
}

fn extract_remote(status: u16, message: &str, body: &str) -> ProviderFailure {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(mut failure) = extract_structured(&json).or_else(|| extract_generic(&json)) {
            // The HTTP status is authoritative when the body omits a code.
            failure.status_code.get_or_insert(status);
            return failure;
        }
    }
    let text = if body.trim().is_empty() { message } else { body };
    ProviderFailure {
        status_code: Some(status),
        status_tag: None,
        message: Some(text.to_string()),
    }
}

/// `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`
fn extract_structured(value: &Value) -> Option<ProviderFailure> {
    let inner = value.get("error")?;
    if !inner.is_object() {
        return None;
    }
    Some(ProviderFailure {
        status_code: inner.get("code").and_then(as_status),
        status_tag: inner
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
        message: inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// `{"message": "...", "status": 503}`
fn extract_generic(value: &Value) -> Option<ProviderFailure> {
    let obj = value.as_object()?;
    let message = obj.get("message").and_then(Value::as_str).map(str::to_string);
    let status_code = obj
        .get("status")
        .or_else(|| obj.get("code"))
        .and_then(as_status);
    if message.is_none() && status_code.is_none() {
        return None;
    }
    Some(ProviderFailure {
        status_code,
        status_tag: None,
        message,
    })
}

fn as_status(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }
}

fn apply_rules(failure: ProviderFailure) -> ErrorClassification {
    let display_message = failure
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());
    let lower = display_message.to_lowercase();
    let mentions_quota = lower.contains("quota");

    let is_quota_exhausted = (failure.status_code == Some(429) && mentions_quota)
        || failure.status_tag.as_deref() == Some(RESOURCE_EXHAUSTED)
        || (failure.status_code.is_none()
            && mentions_quota
            && (lower.contains("exceeded") || lower.contains("exhausted")));
    let is_rate_limit_retryable = failure.status_code == Some(429) && !is_quota_exhausted;

    ErrorClassification {
        is_quota_exhausted,
        is_rate_limit_retryable,
        status_code: failure.status_code,
        provider_status_tag: failure.status_tag,
        display_message,
    }
}
