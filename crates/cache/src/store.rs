//! The cache-store boundary used by entity namespaces.

use std::{future::Future, pin::Pin, time::Duration};

use async_trait::async_trait;
use pigeon_storage::{RequestContext, StorageResult};

/// An owned, sendable boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Recomputes a cache value from the source of truth.
///
/// Loaders are `'static` because the recompute may outlive the caller that
/// started it: if that caller is cancelled, other waiters still need the
/// result.
pub type Loader = Box<dyn FnOnce() -> BoxFuture<'static, StorageResult<String>> + Send>;

/// Boxes an async closure into a [`Loader`].
pub fn loader<F, Fut>(f: F) -> Loader
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<String>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Key-value cache with fetch-through reads and lazy invalidation.
///
/// Object safe; namespaces hold it as `Arc<dyn CacheStore>` so tests can
/// wrap the real store with recording or failure-injecting decorators.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the cached value for `key`, running `loader` on a miss or
    /// after invalidation.
    ///
    /// At most one loader runs per key at a time. Loader errors propagate
    /// and are never cached.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        loader: Loader,
    ) -> StorageResult<String>;

    /// Marks `key` stale. The next fetch recomputes it.
    async fn tag_as_deleted(&self, key: &str) -> StorageResult<()>;

    /// Tags every key, attempting all of them even after a failure.
    ///
    /// Returns the first error encountered.
    async fn tag_as_deleted_batch(&self, keys: &[String]) -> StorageResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.tag_as_deleted(key).await {
                tracing::warn!(key = %key, error = %err, "tag_as_deleted failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Lists every stored key starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Removes `key` outright.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
