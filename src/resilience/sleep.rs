//! Injectable delay used between retry attempts and bulk chunks.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real timer backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Virtual clock: records every requested delay and returns immediately.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
        tokio::task::yield_now().await;
    }
}

pub fn tokio_sleeper() -> Arc<dyn Sleeper> {
    Arc::new(TokioSleeper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sleeper_does_not_wait() {
        let s = RecordingSleeper::new();
        let started = std::time::Instant::now();
        s.sleep(Duration::from_secs(3600)).await;
        s.sleep(Duration::from_millis(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            s.delays(),
            vec![Duration::from_secs(3600), Duration::from_millis(5)]
        );
        assert_eq!(s.total(), Duration::from_millis(3_600_005));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_uses_runtime_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(7)).await;
        assert!(start.elapsed() >= Duration::from_secs(7));
    }
}
