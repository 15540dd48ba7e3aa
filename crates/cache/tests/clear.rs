//! Bulk clear: bounded retry, then report instead of aborting.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use pigeon_cache::{CacheConfig, CacheStore, FetchCache, Loader, RetryConfig, clear_prefixes, loader};
use pigeon_storage::{MemoryBackend, RequestContext, StorageError, StorageResult};

/// Wraps a real cache and fails `delete` for chosen keys a set number of
/// times (`u32::MAX` = forever).
struct FlakyDeletes {
    inner: FetchCache<MemoryBackend>,
    remaining_failures: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl CacheStore for FlakyDeletes {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        loader: Loader,
    ) -> StorageResult<String> {
        self.inner.fetch(ctx, key, ttl, loader).await
    }

    async fn tag_as_deleted(&self, key: &str) -> StorageResult<()> {
        self.inner.tag_as_deleted(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let fail = {
            let mut remaining = self.remaining_failures.lock().expect("lock poisoned");
            match remaining.get_mut(key) {
                Some(n) if *n > 0 => {
                    *n = n.saturating_sub(1);
                    true
                },
                _ => false,
            }
        };
        if fail { Err(StorageError::connection("cache node unreachable")) } else { self.inner.delete(key).await }
    }
}

fn retry() -> RetryConfig {
    RetryConfig::builder()
        .max_retries(2)
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(2))
        .build()
}

async fn seeded(failures: &[(&str, u32)]) -> Arc<FlakyDeletes> {
    let inner = FetchCache::new(MemoryBackend::new(), CacheConfig::default());
    let ctx = RequestContext::background();
    for key in ["USER_INFO_CACHE:u1", "USER_INFO_CACHE:u2", "USER_INFO_CACHE:u3", "GROUP_INFO_CACHE:g1"] {
        inner.fetch(&ctx, key, Duration::from_secs(60), loader(|| async { Ok("{}".to_owned()) })).await.unwrap();
    }
    let remaining = failures.iter().map(|(k, n)| ((*k).to_owned(), *n)).collect();
    Arc::new(FlakyDeletes { inner, remaining_failures: Mutex::new(remaining) })
}

#[tokio::test]
async fn clears_every_key_under_prefix() {
    let store = seeded(&[]).await;
    let report = clear_prefixes(store.as_ref(), &["USER_INFO_CACHE:"], &retry()).await;

    assert!(report.is_complete());
    assert_eq!(report.deleted, 3);
    assert!(store.scan_prefix("USER_INFO_CACHE:").await.unwrap().is_empty());
    assert_eq!(store.scan_prefix("GROUP_INFO_CACHE:").await.unwrap().len(), 1);
}

#[tokio::test]
async fn transient_failures_within_budget_are_absorbed() {
    let store = seeded(&[("USER_INFO_CACHE:u2", 2)]).await;
    let report = clear_prefixes(store.as_ref(), &["USER_INFO_CACHE:"], &retry()).await;

    assert!(report.is_complete());
    assert_eq!(report.deleted, 3);
}

#[tokio::test]
async fn persistent_failure_is_reported_and_sweep_continues() {
    let store = seeded(&[("USER_INFO_CACHE:u2", u32::MAX)]).await;
    let report = clear_prefixes(store.as_ref(), &["USER_INFO_CACHE:", "GROUP_INFO_CACHE:"], &retry()).await;

    assert_eq!(report.deleted, 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].target, "USER_INFO_CACHE:u2");
    assert!(report.failed[0].error.is_transient());
    assert_eq!(store.scan_prefix("USER_INFO_CACHE:").await.unwrap(), vec!["USER_INFO_CACHE:u2"]);
    assert!(report.into_result().is_err());
}
