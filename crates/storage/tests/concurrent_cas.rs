//! Concurrency tests for the conditional-write primitives that the cache
//! layer builds its cross-instance locks on.

#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use bytes::Bytes;
use pigeon_storage::{MemoryBackend, StorageBackend, StorageError, assert_conflict};
use tokio::task::JoinSet;

const CONCURRENCY: usize = 16;
const ROUNDS: usize = 20;

/// Many tasks racing to take the same lock key: exactly one wins, every
/// other attempt sees `Conflict`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_acquisition_has_one_winner_per_round() {
    let backend = MemoryBackend::new();

    for round in 0..ROUNDS {
        let key = format!("lock:{round}").into_bytes();
        let mut set = JoinSet::new();
        for task in 0..CONCURRENCY {
            let backend = backend.clone();
            let key = key.clone();
            set.spawn(async move {
                backend
                    .compare_and_set_with_ttl(
                        &key,
                        None,
                        format!("owner-{task}").into_bytes(),
                        Duration::from_secs(5),
                    )
                    .await
            });
        }

        let mut winners = 0usize;
        while let Some(result) = set.join_next().await {
            match result.expect("task should not panic") {
                Ok(()) => winners += 1,
                Err(StorageError::Conflict) => {},
                Err(e) => panic!("unexpected error in round {round}: {e}"),
            }
        }
        assert_eq!(winners, 1, "round {round}: exactly one task should hold the lock");
    }
}

/// Swapping an existing value: only one of many CAS calls with the same
/// expectation can succeed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn swap_on_existing_value_has_one_winner() {
    let backend = MemoryBackend::new();
    let key = b"entry".to_vec();
    backend.set(key.clone(), b"stale".to_vec()).await.expect("seed");

    let mut set = JoinSet::new();
    for task in 0..CONCURRENCY {
        let backend = backend.clone();
        let key = key.clone();
        set.spawn(async move {
            backend.compare_and_set(&key, Some(b"stale"), format!("fresh-{task}").into_bytes()).await
        });
    }

    let mut winners = 0usize;
    while let Some(result) = set.join_next().await {
        if result.expect("task should not panic").is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    let value = backend.get(&key).await.expect("get").expect("present");
    assert!(value.starts_with(b"fresh-"));
}

/// Concurrent transactions guarding the same key: the loser applies none of
/// its unconditional writes either.
#[tokio::test]
async fn losing_transaction_applies_nothing() {
    let backend = MemoryBackend::new();
    backend.set(b"version".to_vec(), b"1".to_vec()).await.expect("seed");

    let mut a = backend.transaction().await.expect("txn a");
    a.compare_and_set(b"version".to_vec(), Some(b"1".to_vec()), b"2".to_vec()).expect("buffer");
    a.set(b"row:a".to_vec(), b"from-a".to_vec());

    let mut b = backend.transaction().await.expect("txn b");
    b.compare_and_set(b"version".to_vec(), Some(b"1".to_vec()), b"2".to_vec()).expect("buffer");
    b.set(b"row:b".to_vec(), b"from-b".to_vec());

    a.commit().await.expect("first commit wins");
    assert_conflict!(b.commit().await);

    assert_eq!(backend.get(b"row:a").await.expect("get"), Some(Bytes::from("from-a")));
    assert_eq!(backend.get(b"row:b").await.expect("get"), None);
}

/// Range scans running alongside writers always return sorted, live keys.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn prefix_scans_during_writes_stay_consistent() {
    let backend = MemoryBackend::new();
    let range = pigeon_storage::prefix_range(b"CONV:");

    let mut set = JoinSet::new();
    for task in 0..4usize {
        let backend = backend.clone();
        set.spawn(async move {
            for i in 0..50usize {
                let key = format!("CONV:{task}:{i:03}").into_bytes();
                backend.set(key, b"v".to_vec()).await.expect("set");
            }
        });
    }
    for _ in 0..4 {
        let backend = backend.clone();
        let range = range.clone();
        set.spawn(async move {
            for _ in 0..20 {
                let rows = backend.get_range(range.clone()).await.expect("scan");
                assert!(rows.windows(2).all(|w| w[0].key < w[1].key));
                assert!(rows.iter().all(|kv| kv.key.starts_with(b"CONV:")));
                tokio::task::yield_now().await;
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    assert_eq!(backend.get_range(range).await.expect("scan").len(), 200);
}
