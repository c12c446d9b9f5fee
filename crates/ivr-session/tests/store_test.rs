use ivr_session::SessionStore;
use ivr_types::Role;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn history_preserves_append_order() {
    let store = SessionStore::new();
    store.get_or_create("CA1");

    let texts = ["one", "two", "three", "four", "five"];
    for (i, text) in texts.iter().enumerate() {
        let role = if i % 2 == 0 {
            Role::Caller
        } else {
            Role::Assistant
        };
        assert!(store.append_turn("CA1", role, text).await);
    }

    let history = store.history("CA1").await;
    let got: Vec<&str> = history.iter().map(|t| t.text()).collect();
    assert_eq!(got, texts);
    assert_eq!(history[1].role(), Role::Assistant);
}

#[tokio::test]
async fn history_is_a_snapshot() {
    let store = SessionStore::new();
    store.get_or_create("CA1");
    store.append_turn("CA1", Role::Caller, "Hi").await;

    let snapshot = store.history("CA1").await;
    store.append_turn("CA1", Role::Assistant, "Hello").await;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(store.history("CA1").await.len(), 2);
}

#[tokio::test]
async fn write_to_absent_session_is_a_no_op() {
    let store = SessionStore::new();

    assert!(!store.append_turn("ghost", Role::Caller, "Hi").await);
    assert!(!store.contains("ghost"));
    assert!(store.history("ghost").await.is_empty());
}

#[tokio::test]
async fn write_after_removal_is_dropped() {
    let store = SessionStore::new();
    let handle = store.get_or_create("CA1");
    store.append_turn("CA1", Role::Caller, "Hi").await;

    assert!(store.remove("CA1"));
    assert!(!handle.is_live());
    assert!(!store.append_turn("CA1", Role::Assistant, "late").await);
    assert!(store.history("CA1").await.is_empty());

    // A new call under the same id starts clean.
    store.get_or_create("CA1");
    assert!(store.history("CA1").await.is_empty());
}

#[tokio::test]
async fn sessions_do_not_share_turns() {
    let store = Arc::new(SessionStore::new());

    let mut tasks = Vec::new();
    for call in ["A", "B"] {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.get_or_create(call);
            for n in 0..20 {
                store
                    .append_turn(call, Role::Caller, &format!("{}-{}", call, n))
                    .await;
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for call in ["A", "B"] {
        let history = store.history(call).await;
        assert_eq!(history.len(), 20);
        for (n, turn) in history.iter().enumerate() {
            assert_eq!(turn.text(), format!("{}-{}", call, n));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn idle_eviction_keeps_recent_sessions() {
    let store = SessionStore::new();
    store.get_or_create("old");

    tokio::time::advance(Duration::from_secs(600)).await;
    store.get_or_create("new");
    store.append_turn("new", Role::Caller, "still here").await;

    tokio::time::advance(Duration::from_secs(400)).await;

    let evicted = store.evict_idle(Duration::from_secs(900));
    assert_eq!(evicted, vec!["old".to_string()]);
    assert!(!store.contains("old"));
    assert!(store.contains("new"));

    assert!(store.evict_idle(Duration::from_secs(900)).is_empty());
}
