//! Notification callback the client uses to report state changes to the UI layer.
//!
//! Provides the [`Notifier`] trait, [`Severity`], and [`NoopNotifier`]. Concrete sinks
//! (in-memory, tracing, composite) live in [`crate::telemetry`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Severity attached to every user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification sink supplied by the caller.
///
/// Called synchronously from the executor, the cooldown timer task and chat streams,
/// so implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

impl<F> Notifier for F
where
    F: Fn(&str, Severity) + Send + Sync,
{
    fn notify(&self, message: &str, severity: Severity) {
        self(message, severity)
    }
}

/// No-op notifier (always available).
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _: &str, _: Severity) {}
}

/// Returns a no-op notifier.
pub fn noop_notifier() -> Arc<dyn Notifier> {
    Arc::new(NoopNotifier)
}
