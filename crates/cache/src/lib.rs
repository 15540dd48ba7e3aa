//! Fetch-through cache primitive for pigeon.
//!
//! [`FetchCache`] stores JSON payloads in any [`StorageBackend`] and exposes
//! them through the object-safe [`CacheStore`] trait:
//!
//! - **Single-flight**: one caller per key runs the loader; concurrent callers wait on a lock kept
//!   in the shared backend, so the guarantee holds across server instances.
//! - **Jittered TTL**: every write perturbs the configured TTL by the configured fraction.
//! - **Lazy invalidation**: [`CacheStore::tag_as_deleted`] tombstones an entry. The next reader
//!   recomputes it while others may be served the old value.
//! - **No negative caching**: a failing loader leaves the entry as it was and the error reaches
//!   the caller.
//!
//! ```
//! use std::time::Duration;
//!
//! use pigeon_cache::{CacheConfig, CacheStore, FetchCache, loader};
//! use pigeon_storage::{MemoryBackend, RequestContext};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let cache = FetchCache::new(MemoryBackend::new(), CacheConfig::default());
//! let ctx = RequestContext::background();
//!
//! let value = cache
//!     .fetch(&ctx, "USER_INFO_CACHE:u1", Duration::from_secs(60), loader(|| async {
//!         Ok(r#"{"user_id":"u1"}"#.to_owned())
//!     }))
//!     .await
//!     .unwrap();
//! assert_eq!(value, r#"{"user_id":"u1"}"#);
//! # });
//! ```
//!
//! [`StorageBackend`]: pigeon_storage::StorageBackend

#![deny(unsafe_code)]

pub mod clear;
pub mod config;
pub mod entry;
pub mod fetch;
pub mod metrics;
pub mod retry;
pub mod store;

pub use clear::{ClearFailure, ClearReport, clear_prefixes};
pub use config::{CacheConfig, RetryConfig};
pub use entry::CacheEntry;
pub use fetch::{FetchCache, jittered_ttl};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use store::{BoxFuture, CacheStore, Loader, loader};
