//! Bulk word lookup executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{LexiClient, LookupQuality, RequestFailure, RequestOutcome, WordDetails};
use crate::error_code::FailureKind;
use crate::resilience::Sleeper;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Terms looked up concurrently per chunk.
    pub chunk_size: usize,
    /// Pause between chunks, independent of retry backoff.
    pub inter_batch_delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            inter_batch_delay_ms: 2_000,
        }
    }
}

impl BulkConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }
    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay_ms = delay.as_millis() as u64;
        self
    }
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

/// Outcomes of a bulk run, keyed by input index.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub successes: Vec<(usize, WordDetails)>,
    /// Calls that succeeded without complete details (unparsed or fallback).
    pub degraded: Vec<(usize, WordDetails)>,
    pub failures: Vec<(usize, RequestFailure)>,
    pub execution_time: Duration,
    pub total_processed: usize,
}

impl BulkResult {
    pub fn new() -> Self {
        Self::default()
    }
    fn record(&mut self, i: usize, outcome: RequestOutcome<WordDetails>) {
        match outcome {
            RequestOutcome::Success(d) if d.quality == LookupQuality::Complete => {
                self.successes.push((i, d))
            }
            RequestOutcome::Success(d) => self.degraded.push((i, d)),
            RequestOutcome::Failure(f) => self.failures.push((i, f)),
        }
    }
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.degraded.is_empty()
    }
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.successes.len() as f64 / self.total_processed as f64
        }
    }
    /// Whether any term was stopped by quota exhaustion or an active cooldown.
    pub fn hit_cooldown(&self) -> bool {
        self.failures.iter().any(|(_, f)| {
            matches!(
                f.kind,
                FailureKind::QuotaExhausted | FailureKind::CooldownActive
            )
        })
    }
}

/// Runs [`LexiClient::word_details`] over many terms, chunk by chunk.
///
/// Calls inside a chunk run concurrently on the current task; chunks are separated by
/// `inter_batch_delay_ms` to shape the outbound request rate.
pub struct BulkLookup<'a> {
    client: &'a LexiClient,
    config: BulkConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<'a> BulkLookup<'a> {
    pub fn new(client: &'a LexiClient) -> Self {
        Self {
            client,
            config: client.config().bulk.clone(),
            sleeper: Arc::clone(client.executor().sleeper()),
        }
    }
    pub fn with_config(mut self, config: BulkConfig) -> Self {
        self.config = config;
        self
    }
    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    pub async fn run<S: AsRef<str>>(&self, terms: &[S]) -> BulkResult {
        let start = Instant::now();
        let chunk_size = self.config.chunk_size.max(1);
        let chunks = terms.len().div_ceil(chunk_size);
        let mut result = BulkResult::new();

        for (chunk_index, chunk) in terms.chunks(chunk_size).enumerate() {
            if chunk_index > 0 && !self.client.cooldown().is_active() {
                self.sleeper.sleep(self.config.inter_batch_delay()).await;
            }
            debug!(chunk = chunk_index, size = chunk.len(), "bulk lookup chunk");
            let base = chunk_index * chunk_size;
            let outcomes =
                join_all(chunk.iter().map(|t| self.client.word_details(t.as_ref()))).await;
            for (offset, outcome) in outcomes.into_iter().enumerate() {
                result.record(base + offset, outcome);
            }
        }

        result.total_processed = terms.len();
        result.execution_time = start.elapsed();
        info!(
            total = result.total_processed,
            chunks,
            complete = result.successes.len(),
            degraded = result.degraded.len(),
            failed = result.failures.len(),
            "bulk lookup finished"
        );
        result
    }
}
