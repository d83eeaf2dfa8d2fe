//! Process-wide quota cooldown with a timed reset.

use crate::config::DEFAULT_COOLDOWN_SECS;
use crate::notify::{Notifier, Severity};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

static GLOBAL: Lazy<QuotaCooldown> =
    Lazy::new(|| QuotaCooldown::new(Duration::from_secs(DEFAULT_COOLDOWN_SECS)));

#[derive(Debug, Clone)]
pub struct CooldownSnapshot {
    pub is_active: bool,
    pub activated_at: Option<Instant>,
    pub duration_ms: u64,
    /// Remaining cooldown in ms, if currently active.
    pub remaining_ms: Option<u64>,
    pub timer_scheduled: bool,
    /// Number of Inactive -> Active transitions so far.
    pub activations: u64,
}

enum TimerHandle {
    Task(tokio::task::JoinHandle<()>),
    /// Detached thread; it cannot be cancelled, so a stale fire is ignored by epoch.
    Thread,
}

struct State {
    active: bool,
    activated_at: Option<Instant>,
    timer: Option<TimerHandle>,
    activations: u64,
    /// Receives the "resumed" note of the current cycle.
    notifier: Option<Arc<dyn Notifier>>,
}

struct Inner {
    duration: Duration,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Timer path: ends cycle `epoch` unless it already ended.
    fn on_timer(&self, epoch: u64) {
        let st = self.lock();
        if st.active && st.activations == epoch {
            self.finish(st);
        }
    }

    /// Ends the current cycle once its duration has elapsed, whether or not the
    /// timer got to run (its runtime may have shut down).
    fn expire_if_due(&self) {
        let st = self.lock();
        let due = st
            .activated_at
            .map_or(true, |t| t.elapsed() >= self.duration);
        if st.active && due {
            self.finish(st);
        }
    }

    fn finish(&self, mut st: MutexGuard<'_, State>) {
        st.active = false;
        st.activated_at = None;
        if let Some(TimerHandle::Task(handle)) = st.timer.take() {
            handle.abort();
        }
        let notifier = st.notifier.take();
        drop(st);

        info!(cooldown_ms = self.duration.as_millis() as u64, "quota cooldown ended");
        if let Some(notifier) = notifier {
            notifier.notify(
                "The AI usage cooldown has ended. AI features may be used again.",
                Severity::Info,
            );
        }
    }
}

/// Quota-exhaustion cooldown shared by every call site.
///
/// - Starts inactive
/// - `activate` flips it on, notifies once and schedules a one-shot reset
/// - It turns off once the duration has elapsed, announced by the timer or by the
///   first check after expiry; there is no manual reset
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct QuotaCooldown {
    inner: Arc<Inner>,
}

impl QuotaCooldown {
    pub fn new(duration: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                duration,
                state: Mutex::new(State {
                    active: false,
                    activated_at: None,
                    timer: None,
                    activations: 0,
                    notifier: None,
                }),
            }),
        }
    }

    /// The process-wide instance (15 minute cooldown).
    pub fn global() -> QuotaCooldown {
        GLOBAL.clone()
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn is_active(&self) -> bool {
        self.inner.expire_if_due();
        self.inner.lock().active
    }

    /// Remaining time if active.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.expire_if_due();
        let st = self.inner.lock();
        if !st.active {
            return None;
        }
        let elapsed = st.activated_at.map(|t| t.elapsed()).unwrap_or_default();
        Some(self.inner.duration.saturating_sub(elapsed))
    }

    /// Enter cooldown. Returns `false` when it was already active, in which case
    /// nothing is rescheduled and nobody is notified.
    pub fn activate(&self, notifier: Arc<dyn Notifier>, feature: Option<&str>) -> bool {
        self.inner.expire_if_due();
        {
            let mut st = self.inner.lock();
            if st.active {
                return false;
            }
            st.active = true;
            st.activated_at = Some(Instant::now());
            st.activations = st.activations.saturating_add(1);
            let epoch = st.activations;
            st.notifier = Some(Arc::clone(&notifier));
            st.timer = Some(self.schedule_reset(epoch));
        }

        warn!(
            feature = feature.unwrap_or("-"),
            cooldown_ms = self.inner.duration.as_millis() as u64,
            "quota exhausted, cooldown activated"
        );
        let subject = match feature {
            Some(f) => format!("The AI usage quota was exhausted while running '{}'.", f),
            None => "The AI usage quota was exhausted.".to_string(),
        };
        notifier.notify(
            &format!(
                "{} AI features are paused for {}; please try again later.",
                subject,
                describe(self.inner.duration)
            ),
            Severity::Error,
        );
        true
    }

    pub fn snapshot(&self) -> CooldownSnapshot {
        let remaining_ms = self.remaining().map(|d| d.as_millis() as u64);
        let st = self.inner.lock();
        CooldownSnapshot {
            is_active: st.active,
            activated_at: st.activated_at,
            duration_ms: self.inner.duration.as_millis() as u64,
            remaining_ms,
            timer_scheduled: st.timer.is_some(),
            activations: st.activations,
        }
    }

    fn schedule_reset(&self, epoch: u64) -> TimerHandle {
        let inner = Arc::clone(&self.inner);
        let duration = inner.duration;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => TimerHandle::Task(handle.spawn(async move {
                tokio::time::sleep(duration).await;
                inner.on_timer(epoch);
            })),
            // Outside a runtime (e.g. a sync caller) fall back to a plain thread.
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(duration);
                    inner.on_timer(epoch);
                });
                TimerHandle::Thread
            }
        }
    }
}

impl std::fmt::Debug for QuotaCooldown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaCooldown")
            .field("duration", &self.inner.duration)
            .field("active", &self.is_active())
            .finish()
    }
}

fn describe(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    }
}
