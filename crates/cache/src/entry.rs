//! Stored representation of a cache entry.
//!
//! One backend key holds one [`CacheEntry`] encoded as JSON. The value, its
//! tombstone flag and the recompute lock share the record so a single
//! compare-and-set moves the entry between states:
//!
//! ```text
//!            fetch (miss)                loader ok
//!   absent ───────────────▶ locked ──────────────────▶ fresh
//!                             ▲                          │
//!                  fetch      │                          │ tag_as_deleted
//!                 (no lock)   │                          ▼
//!                             └────────────────────── tombstoned
//! ```

use std::time::Duration;

use pigeon_storage::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds. Entries may be read by several processes, so
/// deadlines are absolute rather than monotonic.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Last computed payload. Kept after tombstoning for serve-stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// When `value` stops being servable at all.
    pub expires_at_ms: i64,
    #[serde(default)]
    pub tombstoned: bool,
    /// Token of the caller currently recomputing this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<String>,
    #[serde(default)]
    pub lock_until_ms: i64,
}

impl CacheEntry {
    pub(crate) fn empty() -> Self {
        Self { value: None, expires_at_ms: 0, tombstoned: false, lock_owner: None, lock_until_ms: 0 }
    }

    pub(crate) fn fresh(value: String, ttl: Duration, now: i64) -> Self {
        Self {
            value: Some(value),
            expires_at_ms: now.saturating_add(millis(ttl)),
            tombstoned: false,
            lock_owner: None,
            lock_until_ms: 0,
        }
    }

    /// A present, non-tombstoned value.
    pub fn is_fresh(&self) -> bool {
        self.value.is_some() && !self.tombstoned
    }

    pub fn lock_held(&self, now: i64) -> bool {
        self.lock_owner.is_some() && self.lock_until_ms > now
    }

    pub(crate) fn owned_by(&self, owner: &str) -> bool {
        self.lock_owner.as_deref() == Some(owner)
    }

    pub(crate) fn locked(mut self, owner: String, lock_expire: Duration, now: i64) -> Self {
        self.lock_owner = Some(owner);
        self.lock_until_ms = now.saturating_add(millis(lock_expire));
        self
    }

    pub(crate) fn unlocked(mut self) -> Self {
        self.lock_owner = None;
        self.lock_until_ms = 0;
        self
    }

    /// Tombstones the entry and drops any lock, so an in-flight recompute
    /// that started before the invalidation cannot store its result.
    pub(crate) fn tombstone(mut self, delay: Duration, now: i64) -> Self {
        self.tombstoned = true;
        self.expires_at_ms = now.saturating_add(millis(delay));
        self.unlocked()
    }

    /// Expiry to put on the backend key: long enough for both the value and
    /// the lock, and never zero.
    pub(crate) fn backend_ttl(&self, now: i64) -> Duration {
        let until = self.expires_at_ms.max(self.lock_until_ms);
        let remaining = until.saturating_sub(now).max(1);
        Duration::from_millis(u64::try_from(remaining).unwrap_or(1))
    }

    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StorageError::from_json("encode cache entry", e))
    }

    pub(crate) fn decode(raw: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(raw).map_err(|e| StorageError::from_json("decode cache entry", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_servable() {
        let entry = CacheEntry::fresh("v".into(), Duration::from_secs(10), 1_000);
        assert!(entry.is_fresh());
        assert!(!entry.lock_held(1_000));
        assert_eq!(entry.backend_ttl(1_000), Duration::from_secs(10));
    }

    #[test]
    fn tombstone_clears_lock_and_keeps_value() {
        let entry = CacheEntry::fresh("v".into(), Duration::from_secs(10), 0)
            .locked("me".into(), Duration::from_secs(3), 0)
            .tombstone(Duration::from_secs(5), 100);
        assert!(!entry.is_fresh());
        assert!(!entry.lock_held(100));
        assert_eq!(entry.value.as_deref(), Some("v"));
        assert_eq!(entry.expires_at_ms, 5_100);
    }

    #[test]
    fn lock_extends_backend_ttl() {
        let entry = CacheEntry::empty().locked("me".into(), Duration::from_secs(3), 0);
        assert!(entry.lock_held(2_999));
        assert!(!entry.lock_held(3_000));
        assert_eq!(entry.backend_ttl(0), Duration::from_secs(3));
        // A lapsed record still gets a positive TTL.
        assert_eq!(entry.backend_ttl(10_000), Duration::from_millis(1));
    }

    #[test]
    fn encoding_omits_empty_fields() {
        let raw = CacheEntry::fresh("v".into(), Duration::ZERO, 7).encode().unwrap();
        let text = String::from_utf8(raw.clone()).unwrap();
        assert!(!text.contains("lock_owner"));
        assert_eq!(CacheEntry::decode(&raw).unwrap().value.as_deref(), Some("v"));
    }
}
