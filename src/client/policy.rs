use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call-site retry parameters. Immutable once handed to the executor.
///
/// Attempts are `0..=max_retries`. The delay before attempt `k` (k >= 1) is
/// `initial_delay_ms * backoff_multiplier^(k-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_multiplier() -> f64 {
    2.0
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            backoff_multiplier,
        }
    }

    /// Structured text/JSON generation: 2 retries starting at 7s.
    pub fn text_generation() -> Self {
        Self::new(2, 7_000, 2.0)
    }

    /// Image generation: 1 retry after 8s.
    pub fn image_generation() -> Self {
        Self::new(1, 8_000, 2.0)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Delay that follows `current` after one more non-terminal failure.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = current.as_millis() as f64 * self.backoff_multiplier;
        if !next_ms.is_finite() || next_ms >= u64::MAX as f64 {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(next_ms.round() as u64)
    }

    /// Delay slept before attempt `attempt` (0-based). Attempt 0 has none.
    pub fn delay_before_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let mut delay = self.initial_delay();
        for _ in 1..attempt {
            delay = self.next_delay(delay);
        }
        Some(delay)
    }

    /// Total number of provider calls this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::configuration_with_context(
                format!(
                    "backoff multiplier must be a finite number >= 1, got {}",
                    self.backoff_multiplier
                ),
                ErrorContext::new()
                    .with_field_path(format!("{}.backoff_multiplier", field))
                    .with_source("retry_policy"),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::text_generation()
    }
}
