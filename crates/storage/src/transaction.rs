//! Transaction trait for atomic storage operations.
//!
//! A transaction buffers writes until [`Transaction::commit`]. Reads inside
//! the transaction see its own pending writes; reads outside it see nothing
//! until commit. There is no explicit rollback call: dropping an uncommitted
//! transaction is the rollback, which also covers early returns, panics and
//! cancelled futures.
//!
//! ```
//! use pigeon_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! let mut txn = backend.transaction().await.unwrap();
//! txn.set(b"conversation:u1".to_vec(), b"{}".to_vec());
//! drop(txn);
//!
//! assert!(backend.get(b"conversation:u1").await.unwrap().is_none());
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Transaction handle for atomic multi-operation commits.
///
/// The handle is `Sync` so that futures borrowing it (for example a
/// repository method holding `&dyn Transaction` across an await) stay `Send`.
///
/// # Concurrency
///
/// Conditions registered through [`compare_and_set`](Transaction::compare_and_set)
/// are checked at commit time. If a concurrent writer changed one of those
/// keys, commit fails with [`StorageError::Conflict`](crate::StorageError::Conflict)
/// and nothing is applied.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Reads `key`, preferring this transaction's pending writes.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Buffers a write of `value` at `key`.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete of `key`.
    fn delete(&mut self, key: Vec<u8>);

    /// Buffers a conditional write verified at commit time.
    ///
    /// `expected = None` requires the key to be absent when committing.
    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Applies every buffered operation atomically.
    ///
    /// Consumes the transaction whether or not the commit succeeds.
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
