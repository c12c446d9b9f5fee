//! Unit tests for the activity log.

use ivr_types::Role;
use tempfile::TempDir;

use crate::event::{ActivityEvent, ASSISTANT_MARKER, CALLER_MARKER};
use crate::log::ActivityLog;

async fn open_log() -> (TempDir, ActivityLog) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let log = ActivityLog::open(dir.path().join("logs/conversation.log"), 16)
        .await
        .expect("should open log");
    (dir, log)
}

async fn read(log: &ActivityLog) -> String {
    tokio::fs::read_to_string(log.path())
        .await
        .expect("should read log file")
}

// ── record tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn record_appends_lines_in_order() {
    let (_dir, log) = open_log().await;

    let first = log.record("CA1", Role::Caller, "What are your hours?").await.unwrap();
    let second = log.record("CA1", Role::Assistant, "8 AM to 6 PM.").await.unwrap();

    assert_eq!(first.seq, 1);
    assert_eq!(second.seq, 2);

    let contents = read(&log).await;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(CALLER_MARKER));
    assert!(lines[0].ends_with("(CA1): What are your hours?"));
    assert!(lines[1].contains(ASSISTANT_MARKER));
    assert!(lines[1].ends_with("(CA1): 8 AM to 6 PM."));
}

#[tokio::test]
async fn record_creates_parent_directories() {
    let (dir, log) = open_log().await;
    log.record("CA1", Role::Caller, "hello").await.unwrap();
    assert!(dir.path().join("logs").is_dir());
}

#[tokio::test]
async fn reopen_keeps_existing_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conversation.log");
    {
        let log = ActivityLog::open(&path, 4).await.unwrap();
        log.record("CA1", Role::Caller, "first").await.unwrap();
    }
    let log = ActivityLog::open(&path, 4).await.unwrap();
    log.record("CA1", Role::Caller, "second").await.unwrap();

    assert_eq!(read(&log).await.lines().count(), 2);
}

// ── clear tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn clear_truncates_and_later_writes_start_at_top() {
    let (_dir, log) = open_log().await;
    log.record("CA1", Role::Caller, "one").await.unwrap();
    log.record("CA1", Role::Assistant, "two").await.unwrap();

    log.clear("CA1").await.unwrap();
    assert_eq!(read(&log).await, "");

    log.record("CA2", Role::Caller, "three").await.unwrap();
    let contents = read(&log).await;
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.starts_with("[INFO]"));
}

#[tokio::test]
async fn clear_twice_is_harmless() {
    let (_dir, log) = open_log().await;
    log.clear("CA1").await.unwrap();
    log.clear("CA1").await.unwrap();
    assert_eq!(read(&log).await, "");
}

// ── broadcast tests ──────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_receive_entries_and_clears() {
    let (_dir, log) = open_log().await;
    let mut rx = log.subscribe();

    log.record("CA1", Role::Caller, "hi").await.unwrap();
    log.clear("CA1").await.unwrap();

    match rx.recv().await.unwrap() {
        ActivityEvent::Entry(entry) => {
            assert_eq!(entry.call_id, "CA1");
            assert_eq!(entry.role, Role::Caller);
            assert_eq!(entry.text, "hi");
        }
        other => panic!("expected entry, got {:?}", other),
    }
    assert_eq!(
        rx.recv().await.unwrap(),
        ActivityEvent::Cleared {
            call_id: "CA1".to_string()
        }
    );
}

#[tokio::test]
async fn record_without_subscribers_succeeds() {
    let (_dir, log) = open_log().await;
    assert!(log.record("CA1", Role::Caller, "nobody listening").await.is_ok());
}
