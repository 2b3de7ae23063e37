use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulse_core::common::error::PulseError;
use pulse_core::common::events::TelemetryEvent;
use pulse_core::common::interval::Interval;
use pulse_core::queue::{AddOutcome, EventQueue};
use pulse_core::storage::PulseStore;
use tempfile::tempdir;

fn make_queue(capacity: usize) -> (tempfile::TempDir, EventQueue) {
    let temp_dir = tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("pulse.db");
    let store = PulseStore::new(db_path.to_string_lossy().as_ref(), 2).expect("store");
    (temp_dir, EventQueue::new(store, capacity))
}

fn event(name: &str) -> TelemetryEvent {
    TelemetryEvent {
        event_name: name.to_string(),
        captured_at: "2026-01-01T00:00:00".to_string(),
        app: Some("frappe".to_string()),
        user: Some("test@example.com".to_string()),
        site: Some("test.localhost".to_string()),
        properties: Default::default(),
    }
}

fn names(events: &[TelemetryEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_name.clone()).collect()
}

/// Clock driven by the test, in whole seconds.
fn manual_clock() -> (Arc<AtomicU64>, pulse_core::queue::Clock) {
    let now = Arc::new(AtomicU64::new(100));
    let reader = now.clone();
    (now, Arc::new(move || reader.load(Ordering::SeqCst) as f64))
}

#[test]
fn collect_returns_events_in_insertion_order() {
    let (_temp_dir, queue) = make_queue(100);
    for i in 0..10 {
        queue.add(&event(&format!("test_event_{}", i)), None).expect("add");
    }
    assert_eq!(queue.length().expect("len"), 10);

    let batch = queue.collect(5).expect("collect");
    assert_eq!(batch.len(), 5);
    assert_eq!(batch[0].event_name, "test_event_0");
    assert_eq!(batch[4].event_name, "test_event_4");
    assert_eq!(queue.length().expect("len"), 5);

    let rest = queue.collect(50).expect("collect");
    assert_eq!(
        names(&rest),
        (5..10).map(|i| format!("test_event_{}", i)).collect::<Vec<_>>()
    );
    assert!(queue.collect(5).expect("collect").is_empty());
}

#[test]
fn overflow_drops_oldest_events() {
    let (_temp_dir, queue) = make_queue(50);
    for i in 0..60 {
        queue.add(&event(&format!("test_event_{}", i)), None).expect("add");
    }
    assert_eq!(queue.length().expect("len"), 50);

    let batch = queue.collect(100).expect("collect");
    assert_eq!(batch.len(), 50);
    assert_eq!(batch[0].event_name, "test_event_10");
    assert_eq!(batch[49].event_name, "test_event_59");
}

#[test]
fn same_key_within_interval_is_dropped() {
    let (_temp_dir, queue) = make_queue(100);
    let interval = Interval::from("5s");

    assert_eq!(
        queue.add(&event("test_event"), Some(&interval)).expect("add"),
        AddOutcome::Queued
    );
    assert_eq!(
        queue.add(&event("test_event"), Some(&interval)).expect("add"),
        AddOutcome::RateLimited
    );
    assert_eq!(queue.length().expect("len"), 1);
}

#[test]
fn rate_limit_is_per_event_key() {
    let (_temp_dir, queue) = make_queue(100);
    let interval = Interval::from("5s");

    queue.add(&event("event_1"), Some(&interval)).expect("add");
    queue.add(&event("event_2"), Some(&interval)).expect("add");
    let mut other_site = event("event_1");
    other_site.site = Some("other.localhost".to_string());
    queue.add(&other_site, Some(&interval)).expect("add");

    assert_eq!(queue.length().expect("len"), 3);
}

#[test]
fn rate_limit_expires_after_interval() {
    let (_temp_dir, queue) = make_queue(100);
    let interval = Interval::from("1s");

    queue.add(&event("test_event"), Some(&interval)).expect("add");
    assert_eq!(queue.length().expect("len"), 1);

    std::thread::sleep(Duration::from_millis(1100));

    queue.add(&event("test_event"), Some(&interval)).expect("add");
    assert_eq!(queue.length().expect("len"), 2);
}

#[test]
fn rate_limited_add_leaves_ledger_untouched() {
    let (_temp_dir, queue) = make_queue(100);
    let (now, clock) = manual_clock();
    let queue = queue.with_clock(clock);
    let interval = Interval::Seconds(60);
    let key = event("test_event").event_key();

    queue.add(&event("test_event"), Some(&interval)).expect("add");
    now.store(130, Ordering::SeqCst);
    assert_eq!(
        queue.add(&event("test_event"), Some(&interval)).expect("add"),
        AddOutcome::RateLimited
    );
    assert_eq!(queue.store().ledger_get(&key).expect("ledger"), Some(100.0));

    now.store(161, Ordering::SeqCst);
    assert_eq!(
        queue.add(&event("test_event"), Some(&interval)).expect("add"),
        AddOutcome::Queued
    );
    assert_eq!(queue.store().ledger_get(&key).expect("ledger"), Some(161.0));
    assert_eq!(queue.length().expect("len"), 2);
}

#[test]
fn ledger_entry_from_the_future_counts_as_expired() {
    let (_temp_dir, queue) = make_queue(100);
    let (_now, clock) = manual_clock();
    let queue = queue.with_clock(clock);
    let key = event("test_event").event_key();
    queue.store().ledger_set(&key, 5_000.0).expect("ledger");

    let outcome = queue
        .add(&event("test_event"), Some(&Interval::from("1h")))
        .expect("add");
    assert_eq!(outcome, AddOutcome::Queued);
}

#[test]
fn add_without_interval_ignores_ledger() {
    let (_temp_dir, queue) = make_queue(100);
    queue
        .add(&event("test_event"), Some(&Interval::from("1h")))
        .expect("add");
    queue.add(&event("test_event"), None).expect("add");
    assert_eq!(queue.length().expect("len"), 2);
    assert_eq!(queue.get_last_sent_events(20).expect("ledger").len(), 1);
}

#[test]
fn invalid_interval_is_reported_and_nothing_is_queued() {
    let (_temp_dir, queue) = make_queue(100);
    let err = queue
        .add(&event("test_event"), Some(&Interval::from("bogus")))
        .expect_err("invalid interval");
    assert!(matches!(
        err.downcast_ref::<PulseError>(),
        Some(PulseError::InvalidIntervalFormat(_))
    ));
    assert_eq!(queue.length().expect("len"), 0);
}

#[test]
fn collect_skips_undecodable_entries() {
    let (_temp_dir, queue) = make_queue(100);
    queue.add(&event("before"), None).expect("add");
    queue
        .store()
        .push_fresh("invalid json{", queue.capacity())
        .expect("push");
    queue.add(&event("after"), None).expect("add");

    let batch = queue.collect(3).expect("collect");
    assert_eq!(names(&batch), vec!["before", "after"]);
    assert_eq!(queue.length().expect("len"), 0);
}

#[test]
fn requeue_preserves_order() {
    let (_temp_dir, queue) = make_queue(100);
    for name in ["event_1", "event_2", "event_3", "event_4"] {
        queue.add(&event(name), None).expect("add");
    }

    let batch = queue.collect(3).expect("collect");
    queue.requeue(&batch).expect("requeue");

    let again = queue.collect(4).expect("collect");
    assert_eq!(names(&again), vec!["event_1", "event_2", "event_3", "event_4"]);
}

#[test]
fn requeue_into_full_queue_stays_within_capacity() {
    let (_temp_dir, queue) = make_queue(3);
    for i in 0..3 {
        queue.add(&event(&format!("old_{}", i)), None).expect("add");
    }
    let batch = queue.collect(2).expect("collect");
    queue.add(&event("new_0"), None).expect("add");
    queue.add(&event("new_1"), None).expect("add");

    queue.requeue(&batch).expect("requeue");
    assert_eq!(queue.length().expect("len"), 3);
}

#[test]
fn get_events_is_non_destructive_and_freshest_first() {
    let (_temp_dir, queue) = make_queue(100);
    for name in ["a", "b", "c"] {
        queue.add(&event(name), None).expect("add");
    }

    let peeked = queue.get_events(2).expect("peek");
    assert_eq!(names(&peeked), vec!["c", "b"]);
    assert_eq!(queue.length().expect("len"), 3);
}

#[test]
fn get_last_sent_events_reports_ledger_keys() {
    let (_temp_dir, queue) = make_queue(100);
    queue
        .add(&event("test_event"), Some(&Interval::from("5m")))
        .expect("add");

    let entries = queue.get_last_sent_events(20).expect("ledger");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].event_key,
        "test_event:test.localhost:frappe:test@example.com"
    );
}

#[test]
fn event_key_renders_missing_fields() {
    let mut bare = event("event_1");
    bare.app = None;
    bare.user = None;
    assert_eq!(bare.event_key(), "event_1:test.localhost:None:None");
    assert_ne!(event("event_1").event_key(), event("event_2").event_key());
}

#[test]
fn blank_or_zero_interval_means_no_rate_limit() {
    let (_temp_dir, queue) = make_queue(100);
    for interval in [Interval::from(""), Interval::Seconds(0)] {
        for _ in 0..2 {
            let outcome = queue
                .add(&event("test_event"), Some(&interval))
                .expect("add");
            assert_eq!(outcome, AddOutcome::Queued);
        }
    }
    assert_eq!(queue.length().expect("len"), 4);
    assert!(queue.get_last_sent_events(20).expect("ledger").is_empty());
}

#[test]
fn decode_reports_malformed_payload() {
    let err = TelemetryEvent::decode("invalid json{").expect_err("malformed");
    assert!(matches!(err, PulseError::Decode(_)));

    let payload = serde_json::to_string(&event("ok")).expect("encode");
    assert_eq!(TelemetryEvent::decode(&payload).expect("decode"), event("ok"));
}

#[test]
fn collect_keeps_popped_events_when_store_fails_midway() {
    let (_temp_dir, queue) = make_queue(100);
    queue.add(&event("first"), None).expect("add");
    queue.add(&event("second"), None).expect("add");
    queue
        .store()
        .push_fresh("locked", queue.capacity())
        .expect("push");
    queue
        .store()
        .get_conn()
        .expect("conn")
        .execute_batch(
            "CREATE TRIGGER keep_locked BEFORE DELETE ON pulse_queue
             WHEN OLD.payload = 'locked'
             BEGIN SELECT RAISE(ABORT, 'entry is locked'); END;",
        )
        .expect("trigger");

    let batch = queue.collect(5).expect("partial batch");
    assert_eq!(names(&batch), vec!["first", "second"]);
    assert_eq!(queue.length().expect("len"), 1);

    assert!(queue.collect(5).is_err());
}
