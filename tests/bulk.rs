//! Chunked bulk lookups sharing one cooldown.

mod common;

use std::time::Duration;

use common::{harness, ScriptedBackend, Step};
use lexi_ai::batch::{BulkConfig, BulkLookup};
use lexi_ai::FailureKind;
use serde_json::json;

fn complete() -> Step {
    Step::json(json!({
        "partOfSpeech": "noun",
        "meaning": "m",
        "exampleSentence": "e",
    }))
}

fn config() -> BulkConfig {
    BulkConfig::new()
        .with_chunk_size(2)
        .with_inter_batch_delay(Duration::from_millis(500))
}

#[tokio::test]
async fn test_chunks_are_separated_by_delay() {
    let h = harness(ScriptedBackend::new(vec![complete()]));
    let terms = ["apple", "brook", "cinder", "dune", "ember"];

    let result = BulkLookup::new(&h.client).with_config(config()).run(&terms).await;

    assert_eq!(result.total_processed, 5);
    assert_eq!(result.success_count(), 5);
    assert!(result.all_succeeded());
    assert_eq!(result.success_rate(), 1.0);
    assert_eq!(
        h.sleeper.delays(),
        vec![Duration::from_millis(500), Duration::from_millis(500)]
    );
    let mut indices: Vec<usize> = result.successes.iter().map(|(i, _)| *i).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(result.successes[0].1.term, "apple");
}

#[tokio::test]
async fn test_quota_in_first_chunk_short_circuits_the_rest() {
    let h = harness(ScriptedBackend::new(vec![complete(), Step::quota()]));
    let terms = ["apple", "brook", "cinder", "dune", "ember"];

    let result = BulkLookup::new(&h.client).with_config(config()).run(&terms).await;

    assert_eq!(h.backend.call_count(), 2);
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 4);
    assert!(result.hit_cooldown());
    let kinds: Vec<FailureKind> = result.failures.iter().map(|(_, f)| f.kind).collect();
    assert_eq!(kinds[0], FailureKind::QuotaExhausted);
    assert!(kinds[1..].iter().all(|k| *k == FailureKind::CooldownActive));
    // No pause is spent on chunks that cannot reach the provider.
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_degraded_lookups_are_kept_apart() {
    let h = harness(ScriptedBackend::new(vec![
        complete(),
        Step::Text("sorry, I don't know".into()),
    ]));
    let result = BulkLookup::new(&h.client)
        .with_config(config())
        .run(&["apple", "zzxq"])
        .await;

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.degraded.len(), 1);
    assert_eq!(result.degraded[0].0, 1);
    assert_eq!(result.success_rate(), 0.5);
}
