//! Queue-level properties: enqueue-order observability, rebase
//! equivalence, retry accounting, history bounds, and `clear`.

mod common;

use brio_engine::{path, Engine, EngineOptions, MutationId, MutationStatus, Store};
use common::{gate, until};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn live_snapshots_list_ids_in_commit_order() {
    let observed: Arc<Mutex<Vec<Vec<MutationId>>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = observed.clone();
    let engine = Engine::new(EngineOptions::new().on_queue_change(move |snapshots| {
        let live: Vec<MutationId> = snapshots
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    MutationStatus::Pending | MutationStatus::InFlight
                )
            })
            .map(|s| s.id)
            .collect();
        seen.lock().unwrap().push(live);
    }));
    let store = Store::new(json!({"a": 0, "b": 0, "c": 0}));

    let mut gates = Vec::new();
    for key in ["a", "b", "c"] {
        let (g, r) = gate();
        let mut tx = engine.transaction_on(key, &store);
        tx.set(move |d| d.set(path!(key), json!(1))).unwrap();
        tx.remote(r);
        tx.commit().unwrap();
        gates.push(g);
    }
    for g in gates {
        g.send(Ok(())).unwrap();
    }
    until(|| !engine.queue().has_pending()).await;

    let observed = observed.lock().unwrap();
    assert!(!observed.is_empty());
    // Ids are minted in commit order; every live listing must be ascending
    // no matter how completions race.
    for live in observed.iter() {
        let mut sorted = live.clone();
        sorted.sort();
        assert_eq!(*live, sorted, "live ids out of commit order: {live:?}");
    }
}

#[tokio::test]
async fn failing_one_of_non_conflicting_equals_omitting_it() {
    let initial = json!({"a": {"v": 0}, "b": {"v": 0}, "c": {"v": 0}});

    // Reference run: only the two survivors, committed in order.
    let expected_engine = Engine::new(EngineOptions::new());
    let expected_store = Store::new(initial.clone());
    for (key, val) in [("a", 1), ("c", 3)] {
        let mut tx = expected_engine.transaction_on(key, &expected_store);
        tx.set(move |d| d.set(path!(key, "v"), json!(val))).unwrap();
        tx.remote(|| async { Ok(()) });
        tx.commit().unwrap();
    }
    until(|| !expected_engine.queue().has_pending()).await;
    let expected = expected_store.read();

    // Actual run: all three, middle one fails.
    let engine = Engine::new(EngineOptions::new());
    let store = Store::new(initial);
    let mut gates = Vec::new();
    for (key, val) in [("a", 1), ("b", 2), ("c", 3)] {
        let (g, r) = gate();
        let mut tx = engine.transaction_on(key, &store);
        tx.set(move |d| d.set(path!(key, "v"), json!(val))).unwrap();
        tx.remote(r);
        tx.commit().unwrap();
        gates.push(g);
    }
    let g_c = gates.pop().unwrap();
    let g_b = gates.pop().unwrap();
    let g_a = gates.pop().unwrap();

    g_b.send(Err("fail b".into())).unwrap();
    until(|| {
        engine
            .queue()
            .snapshots()
            .iter()
            .any(|s| s.status == MutationStatus::RolledBack)
    })
    .await;
    g_a.send(Ok(())).unwrap();
    g_c.send(Ok(())).unwrap();
    until(|| !engine.queue().has_pending()).await;

    assert_eq!(store.read(), expected);
}

#[tokio::test]
async fn history_never_exceeds_cap() {
    let engine = Engine::new(EngineOptions::new());
    let store = Store::new(json!({"n": 0}));

    for i in 1..=25 {
        let mut tx = engine.transaction_on("bump", &store);
        tx.set(move |d| d.set(path!("n"), json!(i))).unwrap();
        tx.remote(|| async { Ok(()) });
        tx.commit().unwrap();
        until(|| !engine.queue().has_pending()).await;
    }

    let snapshots = engine.queue().snapshots();
    assert_eq!(snapshots.len(), 20);
    assert!(snapshots
        .iter()
        .all(|s| s.status == MutationStatus::Success));
    assert_eq!(store.read()["n"], 25);
}

#[tokio::test]
async fn retries_redispatch_until_the_remote_succeeds() {
    let attempts = Arc::new(AtomicU32::new(0));
    let engine = Engine::new(EngineOptions::new().max_retries(2));
    let store = Store::new(json!({"n": 0}));

    let mut tx = engine.transaction_on("flaky", &store);
    tx.set(|d| d.set(path!("n"), json!(1))).unwrap();
    let counter = attempts.clone();
    tx.remote(move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Err("transient".into())
            } else {
                Ok(())
            }
        }
    });
    tx.commit().unwrap();

    until(|| !engine.queue().has_pending()).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let history = engine.queue().snapshots();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MutationStatus::Success);
    assert_eq!(history[0].retry_count, 2);
    assert_eq!(store.read()["n"], 1);
}

#[tokio::test]
async fn exhausted_retry_budget_rolls_back() {
    let attempts = Arc::new(AtomicU32::new(0));
    let engine = Engine::new(EngineOptions::new().max_retries(1));
    let store = Store::new(json!({"n": 0}));

    let mut tx = engine.transaction_on("doomed", &store);
    tx.set(|d| d.set(path!("n"), json!(1))).unwrap();
    let counter = attempts.clone();
    tx.remote(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err("still down".into()) }
    });
    tx.commit().unwrap();

    until(|| !engine.queue().has_pending()).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    let history = engine.queue().snapshots();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MutationStatus::RolledBack);
    assert_eq!(history[0].retry_count, 1);
    assert_eq!(store.read()["n"], 0);
}

#[tokio::test]
async fn clear_forgets_live_and_history() {
    let engine = Engine::new(EngineOptions::new());
    let store = Store::new(json!({"n": 0}));

    // One retired success in history.
    let mut tx = engine.transaction_on("first", &store);
    tx.set(|d| d.set(path!("n"), json!(1))).unwrap();
    tx.remote(|| async { Ok(()) });
    tx.commit().unwrap();
    until(|| !engine.queue().has_pending()).await;

    // One gated mutation on the wire.
    let (g, r) = gate();
    let mut tx = engine.transaction_on("second", &store);
    tx.set(|d| d.set(path!("n"), json!(2))).unwrap();
    tx.remote(r);
    tx.commit().unwrap();

    engine.queue().clear();
    assert!(!engine.queue().has_pending());
    assert!(engine.queue().snapshots().is_empty());

    // The forgotten mutation's resolution is dropped; clear does not undo
    // local state.
    g.send(Err("too late".into())).unwrap();
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(engine.queue().snapshots().is_empty());
    assert_eq!(store.read()["n"], 2);
}
