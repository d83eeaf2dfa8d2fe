//! Notification sinks.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`InMemoryNotifier`] | Records notifications; used by tests and deferred renderers |
//! | [`TracingNotifier`] | Routes each severity to the matching `tracing` level |
//! | [`CompositeNotifier`] | Fans one notification out to several sinks |

pub use crate::notify::{noop_notifier, NoopNotifier, Notifier, Severity};

use std::sync::{Arc, RwLock};

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

/// In-memory sink, bounded to the most recent `max` entries.
pub struct InMemoryNotifier {
    events: Arc<RwLock<Vec<Notification>>>,
    max_events: usize,
}
impl InMemoryNotifier {
    pub fn new(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: max.max(1),
        }
    }
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
    pub fn with_severity(&self, severity: Severity) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|n| n.severity == severity)
            .collect()
    }
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new(1_000)
    }
}
impl Notifier for InMemoryNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if let Ok(mut events) = self.events.write() {
            events.push(Notification {
                message: message.to_string(),
                severity,
            });
            if events.len() > self.max_events {
                events.remove(0);
            }
        }
    }
}

/// Logs notifications instead of showing them. Default for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::error!(target: "lexi_ai::notify", "{}", message),
            Severity::Warning => tracing::warn!(target: "lexi_ai::notify", "{}", message),
            Severity::Success | Severity::Info => {
                tracing::info!(target: "lexi_ai::notify", severity = severity.as_str(), "{}", message)
            }
        }
    }
}

/// Composite sink for multiple destinations.
pub struct CompositeNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}
impl CompositeNotifier {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }
    pub fn add_sink(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }
}
impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
impl Notifier for CompositeNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        for s in &self.sinks {
            s.notify(message, severity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_is_bounded() {
        let sink = InMemoryNotifier::new(2);
        sink.notify("a", Severity::Info);
        sink.notify("b", Severity::Warning);
        sink.notify("c", Severity::Error);
        let msgs: Vec<_> = sink.events().into_iter().map(|n| n.message).collect();
        assert_eq!(msgs, vec!["b", "c"]);
        assert_eq!(sink.with_severity(Severity::Error).len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(InMemoryNotifier::default());
        let b = Arc::new(InMemoryNotifier::default());
        let composite = CompositeNotifier::new()
            .add_sink(a.clone())
            .add_sink(b.clone())
            .add_sink(Arc::new(TracingNotifier));
        composite.notify("done", Severity::Success);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
