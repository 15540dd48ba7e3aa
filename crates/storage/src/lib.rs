//! Key-value storage abstraction for pigeon services.
//!
//! Two very different consumers sit on top of [`StorageBackend`]:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │        pigeon-cache          │          pigeon-im           │
//! │  fetch-through cache entries │  relational rows + indexes   │
//! │  (CAS locking, TTL)          │  (transactions)              │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                      pigeon-storage                         │
//! │   StorageBackend / Transaction / RequestContext             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      MemoryBackend                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache layer relies on [`StorageBackend::compare_and_set_with_ttl`]
//! for cross-instance mutual exclusion, so a backend shared by several
//! server processes gives every process the same view of who is
//! recomputing a key. The relational layer relies on [`Transaction`] for
//! atomic multi-row writes.
//!
//! # Quick Start
//!
//! ```
//! use pigeon_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"user:123".to_vec(), b"Alice".to_vec()).await?;
//!     let value = backend.get(b"user:123").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"Alice".to_vec()));
//!
//!     let mut txn = backend.transaction().await?;
//!     txn.set(b"a".to_vec(), b"1".to_vec());
//!     txn.set(b"b".to_vec(), b"2".to_vec());
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with ID generators and assertion macros. Enable
//!   this in `[dev-dependencies]` of downstream crates.

#![deny(unsafe_code)]

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;
pub mod types;

pub use backend::StorageBackend;
pub use context::RequestContext;
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use transaction::Transaction;
pub use types::{KeyValue, prefix_range};
