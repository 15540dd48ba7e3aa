//! [`FetchCache`]: the fetch-through primitive over a shared backend.
//!
//! Mutual exclusion is per key and lives in the backend itself: a caller
//! that finds a miss or a tombstone writes its random owner token into the
//! entry with a compare-and-set. Every other caller, in this process or any
//! other sharing the backend, sees the lock and either waits or is served
//! the tombstoned value.
//!
//! The lock holder runs the loader on a spawned task. If the holder's own
//! request is cancelled it stops waiting, but the task still finishes and
//! stores the result so the remaining waiters are not stuck until the lock
//! lapses.
//!
//! A result is stored only if the entry still carries the holder's token.
//! [`CacheStore::tag_as_deleted`] clears the token, so a value computed from
//! state read before an invalidation is returned to its caller but never
//! written back.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use fail::fail_point;
use pigeon_storage::{RequestContext, StorageBackend, StorageError, StorageResult, prefix_range};
use rand::Rng;
use tokio::select;

use crate::{
    config::CacheConfig,
    entry::{CacheEntry, now_ms},
    metrics::CacheMetrics,
    store::{CacheStore, Loader},
};

/// Upper bound on compare-and-set rounds for a single state transition.
const MAX_CAS_ATTEMPTS: usize = 16;

/// Scales `ttl` by a random factor in `[1 - adjustment, 1 + adjustment]`.
///
/// Entries written in the same instant therefore expire at different times.
#[must_use]
pub fn jittered_ttl(ttl: Duration, adjustment: f64) -> Duration {
    if ttl.is_zero() || adjustment <= 0.0 {
        return ttl;
    }
    let factor = rand::rng().random_range((1.0 - adjustment)..=(1.0 + adjustment));
    ttl.mul_f64(factor)
}

fn new_owner() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}

fn decode_or_empty(key: &str, raw: &[u8]) -> CacheEntry {
    CacheEntry::decode(raw).unwrap_or_else(|err| {
        tracing::warn!(key, error = %err, "replacing undecodable cache entry");
        CacheEntry::empty()
    })
}

struct Inner<S> {
    backend: S,
    config: CacheConfig,
    metrics: CacheMetrics,
}

/// Fetch-through cache over any [`StorageBackend`].
///
/// Cheap to clone; clones share the backend handle, configuration and
/// metrics.
pub struct FetchCache<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for FetchCache<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: StorageBackend + 'static> FetchCache<S> {
    pub fn new(backend: S, config: CacheConfig) -> Self {
        Self::with_metrics(backend, config, CacheMetrics::new())
    }

    pub fn with_metrics(backend: S, config: CacheConfig, metrics: CacheMetrics) -> Self {
        Self { inner: Arc::new(Inner { backend, config, metrics }) }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &S {
        &self.inner.backend
    }

    /// Reads the stored entry for `key` without touching locks or metrics.
    pub async fn entry(&self, key: &str) -> StorageResult<Option<CacheEntry>> {
        match self.inner.backend.get(key.as_bytes()).await? {
            Some(raw) => CacheEntry::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn recompute(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        owner: String,
        load: Loader,
    ) -> StorageResult<String> {
        self.inner.metrics.record_recompute();
        tracing::debug!(key, "recomputing cache entry");

        let inner = Arc::clone(&self.inner);
        let key = key.to_owned();
        let task = tokio::spawn(async move {
            match load().await {
                Ok(value) => {
                    if let Err(err) = inner.store_result(&key, &owner, &value, ttl).await {
                        tracing::warn!(key = %key, error = %err, "failed to store recomputed value");
                    }
                    Ok(value)
                },
                Err(err) => {
                    inner.metrics.record_load_error();
                    if let Err(release_err) = inner.release(&key, &owner).await {
                        tracing::warn!(key = %key, error = %release_err, "failed to release cache lock");
                    }
                    Err(err)
                },
            }
        });

        select! {
            joined = task => joined
                .map_err(|e| StorageError::internal_with_source("cache recompute task failed", e))?,
            () = ctx.cancelled() => {
                tracing::debug!(operation_id = ctx.operation_id(), "caller cancelled, recompute continues");
                Err(StorageError::Cancelled)
            },
        }
    }
}

impl<S: StorageBackend> Inner<S> {
    /// Writes `value` as a fresh entry if `owner` still holds the lock.
    ///
    /// Returns `false` when the result was discarded.
    async fn store_result(
        &self,
        key: &str,
        owner: &str,
        value: &str,
        ttl: Duration,
    ) -> StorageResult<bool> {
        fail_point!("cache-before-store", |_| Err(StorageError::connection("injected store failure")));

        let ttl = jittered_ttl(ttl, self.config.random_expire_adjustment);
        for _ in 0..MAX_CAS_ATTEMPTS {
            let raw = self.backend.get(key.as_bytes()).await?;
            let still_owned =
                raw.as_deref().is_some_and(|raw| decode_or_empty(key, raw).owned_by(owner));
            let Some(raw) = raw.filter(|_| still_owned) else {
                self.metrics.record_discarded();
                tracing::debug!(key, "entry invalidated during recompute, result not stored");
                return Ok(false);
            };

            let fresh = CacheEntry::fresh(value.to_owned(), ttl, now_ms());
            let swapped = self
                .backend
                .compare_and_set_with_ttl(key.as_bytes(), Some(&raw[..]), fresh.encode()?, ttl)
                .await;
            match swapped {
                Ok(()) => return Ok(true),
                Err(StorageError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::Conflict)
    }

    /// Drops `owner`'s lock and leaves the previous value as it was.
    async fn release(&self, key: &str, owner: &str) -> StorageResult<()> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(raw) = self.backend.get(key.as_bytes()).await? else {
                return Ok(());
            };
            let current = decode_or_empty(key, &raw);
            if !current.owned_by(owner) {
                return Ok(());
            }
            let now = now_ms();
            let restored = current.unlocked();
            let backend_ttl = restored.backend_ttl(now);
            match self
                .backend
                .compare_and_set_with_ttl(key.as_bytes(), Some(&raw[..]), restored.encode()?, backend_ttl)
                .await
            {
                Ok(()) => return Ok(()),
                Err(StorageError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::Conflict)
    }
}

#[async_trait]
impl<S: StorageBackend + 'static> CacheStore for FetchCache<S> {
    #[tracing::instrument(skip_all, fields(key = %key))]
    async fn fetch(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        loader: Loader,
    ) -> StorageResult<String> {
        let config = &self.inner.config;
        let metrics = &self.inner.metrics;

        loop {
            if ctx.is_cancelled() {
                return Err(StorageError::Cancelled);
            }

            let raw = self.inner.backend.get(key.as_bytes()).await?;
            let now = now_ms();
            let entry = raw.as_deref().map(|raw| decode_or_empty(key, raw));

            if let Some(entry) = &entry {
                if entry.is_fresh()
                    && let Some(value) = &entry.value
                {
                    metrics.record_hit();
                    tracing::trace!("cache hit");
                    return Ok(value.clone());
                }
                if entry.lock_held(now) {
                    if !config.strong_consistency
                        && let Some(stale) = &entry.value
                    {
                        metrics.record_stale_served();
                        tracing::debug!("serving tombstoned value while another caller recomputes");
                        return Ok(stale.clone());
                    }
                    metrics.record_lock_wait();
                    let wait_ms = u64::try_from(config.lock_sleep.as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(wait_ms, "waiting on cache lock");
                    select! {
                        () = tokio::time::sleep(config.lock_sleep) => continue,
                        () = ctx.cancelled() => return Err(StorageError::Cancelled),
                    }
                }
            }

            metrics.record_miss();
            let owner = new_owner();
            let locked =
                entry.unwrap_or_else(CacheEntry::empty).locked(owner.clone(), config.lock_expire, now);
            let backend_ttl = locked.backend_ttl(now);
            match self
                .inner
                .backend
                .compare_and_set_with_ttl(key.as_bytes(), raw.as_deref(), locked.encode()?, backend_ttl)
                .await
            {
                Ok(()) => return self.recompute(ctx, key, ttl, owner, loader).await,
                // Someone else changed the entry first; look again.
                Err(StorageError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn tag_as_deleted(&self, key: &str) -> StorageResult<()> {
        fail_point!("cache-tag-as-deleted", |_| {
            Err(StorageError::connection("injected tag_as_deleted failure"))
        });

        self.inner.metrics.record_tag();
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(raw) = self.inner.backend.get(key.as_bytes()).await? else {
                return Ok(());
            };
            let now = now_ms();
            let tombstoned = decode_or_empty(key, &raw).tombstone(self.inner.config.delay, now);
            let backend_ttl = tombstoned.backend_ttl(now);
            match self
                .inner
                .backend
                .compare_and_set_with_ttl(key.as_bytes(), Some(&raw[..]), tombstoned.encode()?, backend_ttl)
                .await
            {
                Ok(()) => return Ok(()),
                Err(StorageError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::Conflict)
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let rows = self.inner.backend.get_range(prefix_range(prefix.as_bytes())).await?;
        Ok(rows.iter().map(|kv| kv.key_str()).collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.backend.delete(key.as_bytes()).await
    }
}
