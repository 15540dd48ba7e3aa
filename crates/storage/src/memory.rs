//! In-memory storage backend implementation.
//!
//! [`MemoryBackend`] keeps every key in a single [`BTreeMap`] guarded by a
//! [`parking_lot::RwLock`]. Expiry deadlines live next to the values, so
//! reads, CAS checks and commits observe expiry under the same lock that
//! protects the data.
//!
//! A background task sweeps expired keys once per second. The sweep is only
//! housekeeping: an expired key is already invisible to every operation.
//!
//! ```
//! use pigeon_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```

use std::{
    collections::BTreeMap,
    ops::{Bound, RangeBounds},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{select, sync::watch, time::Instant};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    transaction::Transaction,
    types::KeyValue,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Slot {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

#[derive(Debug, Default)]
struct State {
    slots: BTreeMap<Vec<u8>, Slot>,
}

impl State {
    fn read(&self, key: &[u8], now: Instant) -> Option<&Bytes> {
        self.slots.get(key).filter(|slot| slot.live(now)).map(|slot| &slot.value)
    }

    fn matches(&self, key: &[u8], expected: Option<&[u8]>, now: Instant) -> bool {
        match (expected, self.read(key, now)) {
            (None, None) => true,
            (Some(expected), Some(current)) => expected == &current[..],
            _ => false,
        }
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>, expires_at: Option<Instant>) {
        self.slots.insert(key, Slot { value: Bytes::from(value), expires_at });
    }
}

/// Stops the sweeper when the last backend clone goes away.
struct SweepGuard {
    stop_tx: watch::Sender<()>,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// In-memory storage backend.
///
/// Cloning is cheap; every clone shares the same map. This makes a single
/// `MemoryBackend` usable as the shared store behind several simulated
/// server instances in tests.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
    _sweep: Arc<SweepGuard>,
}

impl MemoryBackend {
    /// Creates an empty backend and starts its expiry sweeper.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(());
        let state = Arc::new(RwLock::new(State::default()));
        tokio::spawn(sweep_expired(Arc::downgrade(&state), stop_rx));
        Self { state, _sweep: Arc::new(SweepGuard { stop_tx }) }
    }

    /// Number of physically stored keys, including expired ones not yet swept.
    #[must_use]
    pub fn stored_len(&self) -> usize {
        self.state.read().slots.len()
    }

    fn cas_inner(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<()> {
        let now = Instant::now();
        let mut state = self.state.write();
        if !state.matches(key, expected, now) {
            return Err(StorageError::Conflict);
        }
        state.put(key.to_vec(), new_value, ttl.map(|ttl| now + ttl));
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn sweep_expired(state: std::sync::Weak<RwLock<State>>, mut stop_rx: watch::Receiver<()>) {
    loop {
        select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
            _ = stop_rx.changed() => return,
        }
        let Some(state) = state.upgrade() else {
            return;
        };
        let now = Instant::now();
        state.write().slots.retain(|_, slot| slot.live(now));
    }
}

fn borrow_bounds<R: RangeBounds<Vec<u8>>>(range: &R) -> (Bound<&[u8]>, Bound<&[u8]>) {
    let start = match range.start_bound() {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    };
    let end = match range.end_bound() {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    };
    (start, end)
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        Ok(self.state.read().read(key, Instant::now()).cloned())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.state.write().put(key, value, None);
        Ok(())
    }

    #[tracing::instrument(
        skip_all,
        fields(key_len = key.len(), ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    )]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let deadline = Instant::now() + ttl;
        self.state.write().put(key, value, Some(deadline));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.cas_inner(key, expected, new_value, None)
    }

    #[tracing::instrument(
        skip_all,
        fields(key_len = key.len(), ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    )]
    async fn compare_and_set_with_ttl(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Duration,
    ) -> StorageResult<()> {
        self.cas_inner(key, expected, new_value, Some(ttl))
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.state.write().slots.remove(key);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        let now = Instant::now();
        let state = self.state.read();
        Ok(state
            .slots
            .range::<[u8], _>(borrow_bounds(&range))
            .filter(|(_, slot)| slot.live(now))
            .map(|(k, slot)| KeyValue::new(Bytes::copy_from_slice(k), slot.value.clone()))
            .collect())
    }

    #[tracing::instrument(skip_all)]
    async fn clear_range<R>(&self, range: R) -> StorageResult<()>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        let mut state = self.state.write();
        let doomed: Vec<Vec<u8>> =
            state.slots.range::<[u8], _>(borrow_bounds(&range)).map(|(k, _)| k.clone()).collect();
        for key in doomed {
            state.slots.remove(&key);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction { backend: self.clone(), writes: BTreeMap::new(), checks: Vec::new() }))
    }
}

#[derive(Debug)]
struct CasCheck {
    key: Vec<u8>,
    expected: Option<Vec<u8>>,
}

/// Buffered transaction over a [`MemoryBackend`].
///
/// `None` in `writes` is a pending delete. A compare-and-set lands in
/// `writes` like a plain set, so later reads see it, and its condition is
/// re-checked against committed state at commit.
struct MemoryTransaction {
    backend: MemoryBackend,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    checks: Vec<CasCheck>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.as_ref().map(|v| Bytes::copy_from_slice(v)));
        }
        self.backend.get(key).await
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.checks.push(CasCheck { key: key.clone(), expected });
        self.writes.insert(key, Some(new_value));
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { backend, writes, checks } = *self;
        let now = Instant::now();
        let mut state = backend.state.write();

        if checks.iter().any(|check| !state.matches(&check.key, check.expected.as_deref(), now)) {
            return Err(StorageError::Conflict);
        }

        for (key, value) in writes {
            match value {
                Some(value) => state.put(key, value, None),
                None => {
                    state.slots.remove(&key);
                },
            }
        }
        Ok(())
    }
}
