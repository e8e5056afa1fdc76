//! Session store behavior across threads and the background sweeper

use clonar::config::SessionConfig;
use clonar::session::{Clock, ManualClock, Session, SessionStore, StaleSweeper};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn store_with_clock(capacity: usize) -> (SessionStore, ManualClock) {
    let clock = ManualClock::default();
    let config = SessionConfig {
        capacity,
        ..SessionConfig::default()
    };
    (SessionStore::from_config(&config, Arc::new(clock.clone())), clock)
}

#[test]
fn test_lru_eviction_respects_recent_reads() {
    let (store, clock) = store_with_clock(2);
    store.set("a", Session::new("a", clock.now()));
    store.set("b", Session::new("b", clock.now()));

    // Reading "a" makes "b" the eviction victim
    assert!(store.get("a").is_some());
    store.set("c", Session::new("c", clock.now()));

    assert_eq!(store.size(), 2);
    assert!(store.get("b").is_none());
    assert!(store.get("a").is_some());
    assert!(store.get("c").is_some());
}

#[test]
fn test_concurrent_writers_stay_within_capacity() {
    let (store, clock) = store_with_clock(16);
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            let clock = clock.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("w{}-{}", worker, i);
                    store.set(&id, Session::new(&id, clock.now()));
                    let _ = store.get(&id);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.size(), 16);
}

#[test]
fn test_replace_keeps_created_at() {
    let (store, clock) = store_with_clock(4);
    let created = clock.now();
    store.set("s", Session::new("s", created));

    clock.advance(Duration::from_secs(30));
    store.set(
        "s",
        Session::new("s", clock.now()).with_payload(serde_json::json!({"turn": 2})),
    );

    let session = store.get("s").unwrap();
    assert_eq!(session.created_at, created);
    assert_eq!(session.payload["turn"], 2);
    assert!(session.last_activity >= created);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_removes_idle_sessions() {
    let (store, clock) = store_with_clock(10);
    store.set("idle", Session::new("idle", clock.now()));
    clock.advance(Duration::from_secs(2 * 3600));
    store.set("fresh", Session::new("fresh", clock.now()));

    let sweeper = StaleSweeper::start(
        store.clone(),
        Duration::from_secs(600),
        Duration::from_secs(3600),
    );

    tokio::time::sleep(Duration::from_secs(601)).await;

    assert!(store.get("idle").is_none());
    assert!(store.get("fresh").is_some());

    sweeper.stop();
    sweeper.join().await;
}
