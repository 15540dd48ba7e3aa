//! Storage backend trait definition.
//!
//! [`StorageBackend`] is a small byte-oriented key-value interface:
//! - **Keys and values are bytes**: callers own their serialization format
//! - **Ordered**: range reads iterate in key order, which makes prefix scans cheap
//! - **Conditional writes**: compare-and-set, optionally with an expiry, is the building block for
//!   cross-process locking
//! - **Transactional**: buffered multi-key writes commit atomically
//!
//! Keys whose TTL has elapsed are logically absent for every read, range
//! read and compare-and-set, even if physical cleanup has not run yet.

use std::{ops::RangeBounds, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, transaction::Transaction, types::KeyValue};

/// Abstract key-value storage backend.
///
/// Implementations must be cheap to share between tasks; every method takes
/// `&self` and the trait requires `Send + Sync`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves the value stored at `key`, or `None` if absent or expired.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores `value` at `key` without expiry. Clears any previous TTL.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Stores `value` at `key`, expiring after `ttl`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Atomically replaces the value at `key` if it currently equals `expected`.
    ///
    /// `expected = None` means "insert only if absent". On mismatch returns
    /// [`StorageError::Conflict`](crate::StorageError::Conflict) and leaves the
    /// key untouched. A successful swap clears any TTL on the key.
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Like [`compare_and_set`](Self::compare_and_set) but the new value
    /// expires after `ttl`.
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set_with_ttl(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Duration,
    ) -> StorageResult<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Returns every live key-value pair within `range`, in key order.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send;

    /// Removes every key within `range`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn clear_range<R>(&self, range: R) -> StorageResult<()>
    where
        R: RangeBounds<Vec<u8>> + Send;

    /// Opens a new transaction.
    ///
    /// Dropping the returned handle without calling
    /// [`commit`](Transaction::commit) discards every buffered write.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;
}
