//! Quota cooldown lifecycle under tokio's paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, ScriptedBackend, Step};
use lexi_ai::notify::Severity;
use lexi_ai::resilience::QuotaCooldown;
use lexi_ai::telemetry::InMemoryNotifier;
use lexi_ai::FailureKind;

#[tokio::test(start_paused = true)]
async fn test_double_activation_notifies_and_schedules_once() {
    let cooldown = QuotaCooldown::new(Duration::from_secs(900));
    let notes = Arc::new(InMemoryNotifier::default());

    assert!(cooldown.activate(notes.clone(), Some("image generation")));
    assert!(!cooldown.activate(notes.clone(), Some("image generation")));

    let snap = cooldown.snapshot();
    assert!(snap.is_active);
    assert!(snap.timer_scheduled);
    assert_eq!(snap.activations, 1);
    let events = notes.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Error);
    assert!(events[0].message.contains("15 minutes"));
}

#[tokio::test(start_paused = true)]
async fn test_timer_resets_and_announces_resume() {
    let cooldown = QuotaCooldown::new(Duration::from_secs(900));
    let notes = Arc::new(InMemoryNotifier::default());
    cooldown.activate(notes.clone(), None);

    tokio::time::sleep(Duration::from_secs(899)).await;
    assert!(cooldown.is_active());

    tokio::time::sleep(Duration::from_secs(2)).await;
    tokio::task::yield_now().await;
    assert!(!cooldown.is_active());
    assert!(!cooldown.snapshot().timer_scheduled);
    let info = notes.with_severity(Severity::Info);
    assert_eq!(info.len(), 1);

    // A later quota error starts a fresh cycle.
    assert!(cooldown.activate(notes.clone(), None));
    assert_eq!(cooldown.snapshot().activations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_calls_resume_after_cooldown() {
    let h = harness(ScriptedBackend::new(vec![
        Step::quota(),
        Step::json(serde_json::json!({
            "partOfSpeech": "verb",
            "meaning": "to move quickly",
            "exampleSentence": "She dashed home.",
        })),
    ]));

    let first = h.client.word_details("dash").await;
    assert_eq!(first.failure_kind(), Some(FailureKind::QuotaExhausted));

    let blocked = h.client.word_details("dash").await;
    assert_eq!(blocked.failure_kind(), Some(FailureKind::CooldownActive));
    assert_eq!(h.backend.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(901)).await;
    tokio::task::yield_now().await;

    let resumed = h.client.word_details("dash").await;
    assert!(resumed.is_success());
    assert_eq!(h.backend.call_count(), 2);
}

#[test]
fn test_cooldown_ends_after_its_runtime_shut_down() {
    let cooldown = QuotaCooldown::new(Duration::from_millis(200));
    let notes = Arc::new(InMemoryNotifier::default());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    rt.block_on(async {
        assert!(cooldown.activate(notes.clone(), Some("word details")));
    });
    // The reset task dies with its runtime.
    drop(rt);

    std::thread::sleep(Duration::from_millis(600));
    assert!(!cooldown.is_active());
    assert_eq!(cooldown.remaining(), None);
    let info = notes.with_severity(Severity::Info);
    assert_eq!(info.len(), 1);

    assert!(cooldown.activate(notes.clone(), None));
    assert_eq!(cooldown.snapshot().activations, 2);
}

#[test]
fn test_concurrent_activation_from_threads_is_idempotent() {
    let cooldown = QuotaCooldown::new(Duration::from_secs(900));
    let notes = Arc::new(InMemoryNotifier::default());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cooldown = cooldown.clone();
            let notes = notes.clone();
            std::thread::spawn(move || cooldown.activate(notes, Some("bulk import")))
        })
        .collect();
    let activated = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|fresh| *fresh)
        .count();

    assert_eq!(activated, 1);
    assert_eq!(notes.len(), 1);
    assert_eq!(cooldown.snapshot().activations, 1);
}
