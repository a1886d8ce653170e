use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use watch_core::{ChangeEvent, ChangeKind, Episode, Item};
use watch_engine::{
    Clock, NotificationLog, NotificationStatus, DEDUP_LOOKBACK, PENDING_TIMEOUT,
};

const T0: f64 = 1_700_000_000.0;

struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    fn new(start: f64) -> Self {
        Self(Arc::new(AtomicU64::new(start.to_bits())))
    }

    fn advance(&self, by: Duration) {
        let now = f64::from_bits(self.0.load(Ordering::SeqCst)) + by.as_secs_f64();
        self.0.store(now.to_bits(), Ordering::SeqCst);
    }

    fn clock(&self) -> Clock {
        let now = Arc::clone(&self.0);
        Arc::new(move || f64::from_bits(now.load(Ordering::SeqCst)))
    }
}

fn advanced(slug: &str, prev: u64, next: u64) -> ChangeEvent {
    let item = Item::new(
        slug,
        slug.to_uppercase(),
        format!("https://example.test/manga/{slug}/"),
        Episode::Number(next),
    );
    ChangeEvent::new(&item, Episode::Number(prev), ChangeKind::EpisodeAdvanced)
}

#[test]
fn first_sighting_claims_the_id() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());
    let event = advanced("a", 10, 11);

    assert!(!log.is_duplicate(&event, DEDUP_LOOKBACK).unwrap());
    assert!(log.is_duplicate(&event, DEDUP_LOOKBACK).unwrap());

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "a:10->11");
    assert_eq!(entries[0].status, NotificationStatus::Pending);
    assert_eq!(entries[0].timestamp, T0);
}

#[test]
fn different_transitions_are_not_duplicates() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());

    assert!(!log.is_duplicate(&advanced("a", 5, 6), DEDUP_LOOKBACK).unwrap());
    assert!(!log.is_duplicate(&advanced("a", 6, 7), DEDUP_LOOKBACK).unwrap());
}

#[test]
fn lookback_window_expires() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());
    let event = advanced("a", 1, 2);

    assert!(!log.is_duplicate(&event, DEDUP_LOOKBACK).unwrap());
    clock.advance(DEDUP_LOOKBACK + Duration::from_secs(1));
    assert!(!log.is_duplicate(&event, DEDUP_LOOKBACK).unwrap());
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn old_entries_are_pruned_on_write() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());

    log.is_duplicate(&advanced("a", 1, 2), DEDUP_LOOKBACK).unwrap();
    clock.advance(Duration::from_secs(25 * 60 * 60));
    log.is_duplicate(&advanced("b", 1, 2), DEDUP_LOOKBACK).unwrap();

    let ids: Vec<String> = log.entries().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["b:1->2".to_string()]);
}

#[test]
fn mark_sent_uses_the_transition_id() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());
    let event = advanced("a", 10, 11);

    log.is_duplicate(&event, DEDUP_LOOKBACK).unwrap();
    clock.advance(Duration::from_secs(5));
    assert!(log.mark_sent(&event).unwrap());

    let entry = &log.entries()[0];
    assert_eq!(entry.status, NotificationStatus::Sent);
    assert_eq!(entry.sent_timestamp, Some(T0 + 5.0));

    // Nothing pending left for that id.
    assert!(!log.mark_sent(&event).unwrap());
}

#[test]
fn reconcile_flags_only_stale_pending_entries() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(temp.path().join("log.json"), clock.clock());

    let stuck = advanced("stuck", 1, 2);
    let delivered = advanced("ok", 1, 2);
    log.is_duplicate(&stuck, DEDUP_LOOKBACK).unwrap();
    log.is_duplicate(&delivered, DEDUP_LOOKBACK).unwrap();
    log.mark_sent(&delivered).unwrap();

    clock.advance(Duration::from_secs(10 * 60));
    let fresh = advanced("fresh", 3, 4);
    log.is_duplicate(&fresh, DEDUP_LOOKBACK).unwrap();

    clock.advance(PENDING_TIMEOUT);
    let flagged = log.reconcile(PENDING_TIMEOUT).unwrap();
    let flagged_ids: Vec<&str> = flagged.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(flagged_ids, vec!["stuck:1->2"]);

    let retry: Vec<String> = log.retry_needed().into_iter().map(|e| e.id).collect();
    assert_eq!(retry, vec!["stuck:1->2".to_string()]);

    // Already flagged entries are not flagged again.
    assert!(log.reconcile(PENDING_TIMEOUT).unwrap().is_empty());
}

#[test]
fn corrupt_log_reads_as_empty_and_is_replaced() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("log.json");
    fs::write(&path, "{{{{").unwrap();

    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(&path, clock.clock());
    assert!(log.entries().is_empty());
    assert!(!log.is_duplicate(&advanced("a", 1, 2), DEDUP_LOOKBACK).unwrap());
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn unwritable_log_surfaces_an_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();

    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(blocker.join("log.json"), clock.clock());
    assert!(log.is_duplicate(&advanced("a", 1, 2), DEDUP_LOOKBACK).is_err());
}

#[test]
fn entries_keep_the_legacy_field_names() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("log.json");
    let clock = ManualClock::new(T0);
    let log = NotificationLog::open(&path, clock.clock());
    log.is_duplicate(&advanced("a", 1, 2), DEDUP_LOOKBACK).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[0]["manga_id"], "a");
    assert_eq!(raw[0]["episode"], "2");
    assert_eq!(raw[0]["prev_episode"], "1");
    assert_eq!(raw[0]["status"], "pending");
}
