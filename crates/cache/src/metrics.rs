//! Counters for fetch-through behaviour.
//!
//! All counters are independent and use `Ordering::Relaxed`; a snapshot may
//! be slightly inconsistent across counters, which is fine for telemetry.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    recomputes: AtomicU64,
    lock_waits: AtomicU64,
    load_errors: AtomicU64,
    discarded_results: AtomicU64,
    tags: AtomicU64,
}

/// Shared handle to the cache counters. Clones observe the same values.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    inner: Arc<Counters>,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Tombstoned values returned while another caller recomputed.
    pub stale_served: u64,
    /// Loader invocations.
    pub recomputes: u64,
    pub lock_waits: u64,
    pub load_errors: u64,
    /// Loader results not stored because the entry was invalidated meanwhile.
    pub discarded_results: u64,
    pub tags: u64,
}

impl CacheMetricsSnapshot {
    /// Hit ratio over all fetches, or `0.0` before the first fetch.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_served(&self) {
        self.inner.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recompute(&self) {
        self.inner.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_wait(&self) {
        self.inner.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_error(&self) {
        self.inner.load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.inner.discarded_results.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tag(&self) {
        self.inner.tags.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let c = &self.inner;
        CacheMetricsSnapshot {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            recomputes: c.recomputes.load(Ordering::Relaxed),
            lock_waits: c.lock_waits.load(Ordering::Relaxed),
            load_errors: c.load_errors.load(Ordering::Relaxed),
            discarded_results: c.discarded_results.load(Ordering::Relaxed),
            tags: c.tags.load(Ordering::Relaxed),
        }
    }
}
