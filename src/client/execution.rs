//! Retry/backoff driver around a single provider call.
//!
//! One [`RetryingExecutor::execute`] invocation makes at most `max_retries + 1` strictly
//! sequential calls. Every exit path except first-try success emits exactly one
//! notification, and no provider error escapes: the caller only ever sees a
//! [`RequestOutcome`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use super::error_classification::{classify, ErrorClassification};
use super::policy::RetryPolicy;
use crate::error_code::FailureKind;
use crate::notify::{Notifier, Severity};
use crate::resilience::{QuotaCooldown, Sleeper};
use crate::structured::{extract, missing_fields};
use crate::types::{GenerateResponse, ImagePayload};
use crate::Result;

/// Why an executor invocation produced no usable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    /// The message that was sent to the notifier for this failure.
    pub message: String,
    /// Provider calls actually made.
    pub attempts: u32,
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RequestFailure {}

/// Result of one top-level executor invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Success(T),
    Failure(RequestFailure),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn ok(self) -> Option<T> {
        match self {
            RequestOutcome::Success(v) => Some(v),
            RequestOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RequestFailure> {
        match self {
            RequestOutcome::Success(_) => None,
            RequestOutcome::Failure(f) => Some(f),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure().map(|f| f.kind)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Success(v) => RequestOutcome::Success(f(v)),
            RequestOutcome::Failure(e) => RequestOutcome::Failure(e),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, RequestFailure> {
        match self {
            RequestOutcome::Success(v) => Ok(v),
            RequestOutcome::Failure(e) => Err(e),
        }
    }
}

/// Verdict on one successful provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection<T> {
    /// Return this value.
    Accept(T),
    /// Return this value, but tell the user something about it.
    AcceptWithNotice(T, String),
    /// The listed fields are missing; retry if attempts remain.
    Incomplete(Vec<String>),
}

/// What a call site considers a usable response.
pub trait Expectation: Send + Sync {
    type Output;

    fn inspect(&self, response: GenerateResponse) -> Inspection<Self::Output>;

    /// Called when the final attempt was still incomplete. `Ok` is a degraded result
    /// (notified as a warning), `Err` a hard failure.
    fn exhausted(&self, missing: &[String]) -> std::result::Result<Self::Output, FailureKind>;
}

/// Payload of a structured (JSON) call.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredPayload {
    /// Decoded and every required field present.
    Complete(Value),
    /// The call succeeded but the text was not JSON; returned untouched.
    Unparsed(String),
    /// Required fields were still missing after the last attempt.
    Degraded { fallback: Value, missing: Vec<String> },
}

impl StructuredPayload {
    pub fn is_complete(&self) -> bool {
        matches!(self, StructuredPayload::Complete(_))
    }
}

/// Decode text as JSON and require a set of fields.
#[derive(Debug, Clone)]
pub struct JsonExpectation {
    required: Vec<String>,
    fallback: Value,
}

impl JsonExpectation {
    pub fn new<S: AsRef<str>>(required: &[S], fallback: Value) -> Self {
        Self {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
            fallback,
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

impl Expectation for JsonExpectation {
    type Output = StructuredPayload;

    fn inspect(&self, response: GenerateResponse) -> Inspection<StructuredPayload> {
        let raw = response.text.unwrap_or_default();
        let Some(value) = extract(&raw) else {
            return Inspection::AcceptWithNotice(
                StructuredPayload::Unparsed(raw),
                "The AI answered in an unexpected format; showing the raw response.".to_string(),
            );
        };
        let required: Vec<&str> = self.required.iter().map(String::as_str).collect();
        let missing = missing_fields(&value, &required);
        if missing.is_empty() {
            Inspection::Accept(StructuredPayload::Complete(value))
        } else {
            Inspection::Incomplete(missing)
        }
    }

    fn exhausted(&self, missing: &[String]) -> std::result::Result<StructuredPayload, FailureKind> {
        Ok(StructuredPayload::Degraded {
            fallback: self.fallback.clone(),
            missing: missing.to_vec(),
        })
    }
}

/// Require a non-empty binary image in the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExpectation;

impl Expectation for ImageExpectation {
    type Output = ImagePayload;

    fn inspect(&self, response: GenerateResponse) -> Inspection<ImagePayload> {
        match response.image {
            Some(image) if !image.bytes.is_empty() => Inspection::Accept(image),
            _ => Inspection::Incomplete(vec!["image".to_string()]),
        }
    }

    fn exhausted(&self, _missing: &[String]) -> std::result::Result<ImagePayload, FailureKind> {
        Err(FailureKind::MissingPayload)
    }
}

/// Composes cooldown, classifier, extractor and backoff around one provider call.
#[derive(Clone)]
pub struct RetryingExecutor {
    cooldown: QuotaCooldown,
    notifier: Arc<dyn Notifier>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingExecutor {
    pub fn new(cooldown: QuotaCooldown, notifier: Arc<dyn Notifier>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            cooldown,
            notifier,
            sleeper,
        }
    }

    pub fn cooldown(&self) -> &QuotaCooldown {
        &self.cooldown
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Run `operation` under `policy` until `expectation` accepts a response, a quota
    /// error stops the loop, or attempts run out.
    pub async fn execute<E, F, Fut>(
        &self,
        mut operation: F,
        policy: &RetryPolicy,
        feature: &str,
        expectation: &E,
    ) -> RequestOutcome<E::Output>
    where
        E: Expectation,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<GenerateResponse>>,
    {
        let mut delay = policy.initial_delay();
        let mut calls: u32 = 0;

        for attempt in 0..=policy.max_retries {
            // Before attempt 0 this is the plain short-circuit; before later attempts it
            // catches a cooldown activated by a concurrent call during our backoff.
            if let Some(remaining) = self.cooldown.remaining() {
                return self.fail_cooldown_active(feature, remaining, calls);
            }

            debug!(feature, attempt, "provider call");
            calls += 1;
            let is_last = attempt == policy.max_retries;

            match operation().await {
                Ok(response) => match expectation.inspect(response) {
                    Inspection::Accept(value) => {
                        if attempt > 0 {
                            self.notifier.notify(
                                &format!("{} succeeded after {} attempts.", feature, calls),
                                Severity::Success,
                            );
                        }
                        return RequestOutcome::Success(value);
                    }
                    Inspection::AcceptWithNotice(value, notice) => {
                        warn!(feature, attempt, "accepted response with notice");
                        self.notifier.notify(&notice, Severity::Warning);
                        return RequestOutcome::Success(value);
                    }
                    Inspection::Incomplete(missing) if !is_last => {
                        warn!(
                            feature,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            missing = %missing.join(","),
                            "incomplete response, retrying"
                        );
                        self.notifier.notify(
                            &format!(
                                "The AI returned incomplete {} (missing {}). Retrying in {} (attempt {} of {})...",
                                feature,
                                missing.join(", "),
                                format_delay(delay),
                                attempt + 2,
                                policy.max_attempts()
                            ),
                            Severity::Warning,
                        );
                    }
                    Inspection::Incomplete(missing) => {
                        return self.finish_incomplete(expectation, feature, &missing, calls);
                    }
                },
                Err(err) => {
                    let class = classify(&err);
                    debug!(
                        feature,
                        attempt,
                        status_code = class.status_code,
                        provider_status = class.provider_status_tag.as_deref().unwrap_or("-"),
                        error = %err,
                        "provider call failed"
                    );

                    if class.is_quota_exhausted {
                        return self.fail_quota(feature, &class, calls);
                    }
                    if is_last {
                        return self.fail_exhausted(feature, &class, calls);
                    }

                    warn!(
                        feature,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        status_code = class.status_code,
                        rate_limited = class.is_rate_limit_retryable,
                        "retrying after error"
                    );
                    let message = if class.is_rate_limit_retryable {
                        format!(
                            "The AI service is busy (rate limited) during {}. Retrying in {}...",
                            feature,
                            format_delay(delay)
                        )
                    } else {
                        format!(
                            "{} failed ({}). Retrying in {}...",
                            feature,
                            class.display_message,
                            format_delay(delay)
                        )
                    };
                    self.notifier.notify(&message, Severity::Warning);
                }
            }

            self.sleeper.sleep(delay).await;
            delay = policy.next_delay(delay);
        }

        // Only reachable if the loop above stops returning from its last iteration.
        let message = format!("{} failed for an unknown reason.", feature);
        error!(feature, attempts = calls, "retry loop ended without outcome");
        self.notifier.notify(&message, Severity::Error);
        RequestOutcome::Failure(RequestFailure {
            kind: FailureKind::TransientOrUnknown,
            message,
            attempts: calls,
        })
    }

    /// JSON call requiring `required` fields, degrading to `fallback`.
    pub async fn execute_json<F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy,
        feature: &str,
        required: &[&str],
        fallback: Value,
    ) -> RequestOutcome<StructuredPayload>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<GenerateResponse>>,
    {
        let expectation = JsonExpectation::new(required, fallback);
        self.execute(operation, policy, feature, &expectation).await
    }

    /// Image call requiring binary bytes.
    pub async fn execute_image<F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy,
        feature: &str,
    ) -> RequestOutcome<ImagePayload>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<GenerateResponse>>,
    {
        self.execute(operation, policy, feature, &ImageExpectation).await
    }

    /// Failure for a call site that cannot start, e.g. no API key.
    pub fn reject(&self, kind: FailureKind, message: impl Into<String>) -> RequestFailure {
        let message = message.into();
        error!(kind = kind.name(), "request rejected before any attempt");
        self.notifier.notify(&message, Severity::Error);
        RequestFailure {
            kind,
            message,
            attempts: 0,
        }
    }

    fn fail_cooldown_active<T>(&self, feature: &str, remaining: Duration, calls: u32) -> RequestOutcome<T> {
        let minutes = remaining.as_secs().div_ceil(60).max(1);
        let message = format!(
            "AI features are paused because the usage quota was exhausted. {} is unavailable for about {} more minute{}.",
            feature,
            minutes,
            if minutes == 1 { "" } else { "s" }
        );
        warn!(feature, remaining_ms = remaining.as_millis() as u64, attempts = calls, "cooldown active, not calling provider");
        self.notifier.notify(&message, Severity::Error);
        RequestOutcome::Failure(RequestFailure {
            kind: FailureKind::CooldownActive,
            message,
            attempts: calls,
        })
    }

    fn fail_quota<T>(&self, feature: &str, class: &ErrorClassification, calls: u32) -> RequestOutcome<T> {
        error!(
            feature,
            status_code = class.status_code,
            provider_status = class.provider_status_tag.as_deref().unwrap_or("-"),
            "quota exhausted"
        );
        let message = format!("AI quota exhausted during {}: {}", feature, class.display_message);
        // A fresh activation already notified; otherwise the cooldown was set by
        // someone else and this call still owes the user one message.
        if !self.cooldown.activate(Arc::clone(&self.notifier), Some(feature)) {
            self.notifier.notify(&message, Severity::Error);
        }
        RequestOutcome::Failure(RequestFailure {
            kind: FailureKind::QuotaExhausted,
            message,
            attempts: calls,
        })
    }

    fn fail_exhausted<T>(&self, feature: &str, class: &ErrorClassification, calls: u32) -> RequestOutcome<T> {
        let kind = FailureKind::from_classification(class);
        let message = if class.is_rate_limit_retryable {
            format!(
                "The AI service is still rate limited; {} failed after {} attempts. Please try again in a few minutes.",
                feature, calls
            )
        } else {
            format!("{} failed after {} attempts: {}", feature, calls, class.display_message)
        };
        error!(feature, attempts = calls, kind = kind.name(), status_code = class.status_code, "giving up");
        self.notifier.notify(&message, Severity::Error);
        RequestOutcome::Failure(RequestFailure {
            kind,
            message,
            attempts: calls,
        })
    }

    fn finish_incomplete<E: Expectation>(
        &self,
        expectation: &E,
        feature: &str,
        missing: &[String],
        calls: u32,
    ) -> RequestOutcome<E::Output> {
        match expectation.exhausted(missing) {
            Ok(degraded) => {
                warn!(feature, attempts = calls, missing = %missing.join(","), "returning degraded result");
                self.notifier.notify(
                    &format!(
                        "The AI could not provide complete {} after {} attempts (missing {}). Showing what is available.",
                        feature,
                        calls,
                        missing.join(", ")
                    ),
                    Severity::Warning,
                );
                RequestOutcome::Success(degraded)
            }
            Err(kind) => {
                let message = format!(
                    "The AI returned no {} for {} after {} attempts.",
                    missing.join(", "),
                    feature,
                    calls
                );
                error!(feature, attempts = calls, kind = kind.name(), "required payload never arrived");
                self.notifier.notify(&message, Severity::Error);
                RequestOutcome::Failure(RequestFailure {
                    kind,
                    message,
                    attempts: calls,
                })
            }
        }
    }
}

fn format_delay(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RecordingSleeper;
    use crate::telemetry::InMemoryNotifier;
    use crate::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor() -> (RetryingExecutor, Arc<InMemoryNotifier>, RecordingSleeper) {
        let notifier = Arc::new(InMemoryNotifier::default());
        let sleeper = RecordingSleeper::new();
        let exec = RetryingExecutor::new(
            QuotaCooldown::new(Duration::from_secs(900)),
            notifier.clone(),
            Arc::new(sleeper.clone()),
        );
        (exec, notifier, sleeper)
    }

    fn remote(status: u16, message: &str) -> Error {
        Error::Remote {
            status,
            message: message.to_string(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_first_try_success_is_silent() {
        let (exec, notes, sleeper) = executor();
        let out = exec
            .execute_json(
                || async { Ok(GenerateResponse::from_text(r#"{"meaning":"m"}"#)) },
                &RetryPolicy::new(2, 1000, 2.0),
                "word details",
                &["meaning"],
                json!({}),
            )
            .await;
        assert_eq!(out, RequestOutcome::Success(StructuredPayload::Complete(json!({"meaning": "m"}))));
        assert!(notes.is_empty());
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_unparsed_text_is_returned_as_is() {
        let (exec, notes, _) = executor();
        let calls = AtomicU32::new(0);
        let out = exec
            .execute_json(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(GenerateResponse::from_text("not json")) }
                },
                &RetryPolicy::new(2, 1000, 2.0),
                "word details",
                &["meaning"],
                json!({}),
            )
            .await;
        assert_eq!(out, RequestOutcome::Success(StructuredPayload::Unparsed("not json".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notes.with_severity(Severity::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_generic_exhaustion_names_attempts() {
        let (exec, notes, sleeper) = executor();
        let out = exec
            .execute_image(
                || async { Err(remote(503, "Service Unavailable")) },
                &RetryPolicy::new(1, 8000, 2.0),
                "image generation",
            )
            .await;
        let failure = out.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::TransientOrUnknown);
        assert_eq!(failure.attempts, 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(8000)]);
        let events = notes.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[1].severity, Severity::Error);
        assert!(events[1].message.contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_rate_limit_wording_differs() {
        let (exec, notes, _) = executor();
        let out = exec
            .execute_image(
                || async { Err(remote(429, "Too Many Requests")) },
                &RetryPolicy::new(1, 10, 2.0),
                "image generation",
            )
            .await;
        assert_eq!(out.failure_kind(), Some(FailureKind::RateLimited));
        let events = notes.events();
        assert!(events[0].message.contains("rate limited"));
        assert!(events[1].message.contains("still rate limited"));
    }

    #[tokio::test]
    async fn test_image_without_bytes_is_missing_payload() {
        let (exec, notes, sleeper) = executor();
        let out = exec
            .execute_image(
                || async { Ok(GenerateResponse::from_text("I cannot draw that")) },
                &RetryPolicy::new(1, 8000, 2.0),
                "image generation",
            )
            .await;
        assert_eq!(out.failure_kind(), Some(FailureKind::MissingPayload));
        assert_eq!(sleeper.delays().len(), 1);
        assert_eq!(notes.with_severity(Severity::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_success_after_retry_notifies_once() {
        let (exec, notes, _) = executor();
        let calls = AtomicU32::new(0);
        let out = exec
            .execute_image(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(remote(500, "Internal"))
                        } else {
                            Ok(GenerateResponse::from_image(ImagePayload {
                                mime_type: "image/png".into(),
                                bytes: vec![1, 2, 3],
                            }))
                        }
                    }
                },
                &RetryPolicy::new(1, 8000, 2.0),
                "image generation",
            )
            .await;
        assert!(out.is_success());
        assert_eq!(notes.with_severity(Severity::Success).len(), 1);
    }

    #[tokio::test]
    async fn test_reject_counts_no_attempts() {
        let (exec, notes, _) = executor();
        let failure = exec.reject(FailureKind::NoCredential, "No API key configured.");
        assert_eq!(failure.attempts, 0);
        assert_eq!(notes.with_severity(Severity::Error).len(), 1);
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_millis(7000)), "7s");
        assert_eq!(format_delay(Duration::from_millis(1500)), "1.5s");
    }
}
