//! Classification of provider failures into quota, rate-limit and generic errors.

use lexi_ai::client::error_classification::{classify, classify_parts, classify_value};
use lexi_ai::error_code::FailureKind;
use lexi_ai::Error;
use serde_json::json;

fn remote(status: u16, body: &str) -> Error {
    Error::Remote {
        status,
        message: "Too Many Requests".to_string(),
        body: body.to_string(),
    }
}

#[test]
fn test_429_mentioning_quota_is_quota_exhausted() {
    for msg in [
        "Quota exceeded for metric generate_content_requests",
        "you have used up your QUOTA",
        "quota",
    ] {
        let c = classify_parts(Some(429), None, msg);
        assert!(c.is_quota_exhausted, "{msg}");
        assert!(!c.is_rate_limit_retryable, "{msg}");
    }
}

#[test]
fn test_429_without_quota_is_rate_limit() {
    for msg in ["Too many requests", "Rate limit reached", ""] {
        let c = classify_parts(Some(429), None, msg);
        assert!(c.is_rate_limit_retryable, "{msg}");
        assert!(!c.is_quota_exhausted, "{msg}");
    }
}

#[test]
fn test_no_status_needs_quota_and_exceeded_or_exhausted() {
    assert!(classify_parts(None, None, "Quota exceeded").is_quota_exhausted);
    assert!(classify_parts(None, None, "daily quota exhausted").is_quota_exhausted);
    assert!(!classify_parts(None, None, "quota check pending").is_quota_exhausted);
    // With a non-429 status the text rule does not apply.
    assert!(!classify_parts(Some(500), None, "quota exceeded").is_quota_exhausted);
}

#[test]
fn test_resource_exhausted_tag_is_always_quota() {
    let c = classify_parts(Some(503), Some("RESOURCE_EXHAUSTED"), "try later");
    assert!(c.is_quota_exhausted);
    assert!(!c.is_rate_limit_retryable);
}

#[test]
fn test_structured_body_preferred_over_http_message() {
    let err = remote(
        429,
        r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#,
    );
    let c = classify(&err);
    assert!(c.is_quota_exhausted);
    assert_eq!(c.status_code, Some(429));
    assert_eq!(c.provider_status_tag.as_deref(), Some("RESOURCE_EXHAUSTED"));
    assert!(c.display_message.starts_with("Resource has been exhausted"));
    assert_eq!(FailureKind::from_classification(&c), FailureKind::QuotaExhausted);
}

#[test]
fn test_generic_object_and_plain_text_bodies() {
    let c = classify_value(&json!({"message": "backend overloaded", "status": "503"}));
    assert_eq!(c.status_code, Some(503));
    assert_eq!(c.display_message, "backend overloaded");

    let c = classify(&remote(429, "slow down please"));
    assert!(c.is_rate_limit_retryable);
    assert_eq!(c.display_message, "slow down please");
    assert_eq!(FailureKind::from_classification(&c), FailureKind::RateLimited);
}

#[test]
fn test_unstructured_errors_fall_back_to_unknown() {
    let c = classify_value(&json!(null));
    assert!(!c.is_quota_exhausted && !c.is_rate_limit_retryable);
    assert_eq!(c.status_code, None);

    let c = classify(&Error::StaleConversation);
    assert_eq!(FailureKind::from_classification(&c), FailureKind::TransientOrUnknown);
    assert!(!c.display_message.is_empty());
}
