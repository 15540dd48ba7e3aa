//! Entity cache namespaces.
//!
//! [`EntityCache`] exposes one `get_*` accessor per cached entity and a
//! matching `del_*`. Every accessor is a fetch-through read: the value is
//! served from the [`CacheStore`] and recomputed from the relational store
//! under single-flight when missing or tagged. Values are stored as JSON.
//!
//! Batch reads come in two flavours:
//!
//! - **List endpoints** ([`EntityCache::get_group_members_info`]) log and skip items that fail, and
//!   return what they could resolve.
//! - **Consistency-sensitive endpoints** ([`EntityCache::get_users_info`],
//!   [`EntityCache::get_conversations`]) fail as a whole on the first item error, because their
//!   callers make write decisions on the result.
//!
//! Write paths tag dependent keys through [`Invalidation`] after their
//! transaction commits.

mod conversation;
mod extend_msg;
mod friend;
mod group;
mod invalidation;
pub mod keys;
pub mod pagination;
mod user;

use std::{future::Future, sync::Arc, time::Duration};

pub use invalidation::Invalidation;
use pigeon_cache::{ClearReport, CacheStore, RetryConfig, clear_prefixes, loader};
use pigeon_storage::{RequestContext, StorageBackend, StorageError, StorageResult};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::ServiceConfig,
    error::{ImError, ImResult},
    relation::Repos,
};

struct Inner<S> {
    store: Arc<dyn CacheStore>,
    repos: Repos<S>,
    ttl: Duration,
    clear_retry: RetryConfig,
}

/// Typed read-through accessors over a shared [`CacheStore`].
///
/// Cloning is cheap and clones share the same store and repositories.
pub struct EntityCache<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for EntityCache<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

/// Context for work done inside a loader.
///
/// A recompute serves every waiter on the key, so it must not inherit the
/// cancellation of whichever caller happened to start it.
fn loader_context(ctx: &RequestContext) -> RequestContext {
    let detached = RequestContext::new(ctx.operation_id());
    match ctx.op_user_id() {
        Some(user) => detached.with_op_user(user),
        None => detached,
    }
}

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub fn new(store: Arc<dyn CacheStore>, repos: Repos<S>, config: &ServiceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                repos,
                ttl: config.entity_ttl(),
                clear_retry: config.cache().clear_retry().clone(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.store
    }

    pub(crate) fn repos(&self) -> &Repos<S> {
        &self.inner.repos
    }

    /// Starts an empty invalidation batch.
    pub fn invalidation(&self) -> Invalidation {
        Invalidation::new(Arc::clone(&self.inner.store))
    }

    /// Removes every entry of every namespace.
    ///
    /// Keys that keep failing after bounded retries are listed in the
    /// report; the sweep itself never aborts.
    pub async fn clear_all(&self) -> ClearReport {
        let prefixes: Vec<String> = keys::ALL_PREFIXES.iter().map(|p| keys::scan_prefix(p)).collect();
        let prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
        clear_prefixes(self.inner.store.as_ref(), &prefixes, &self.inner.clear_retry).await
    }

    /// Fetch-through read of one JSON value.
    ///
    /// `entity` and `id` name the row for [`ImError::NotFound`].
    async fn fetch_json<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        entity: &'static str,
        id: &str,
        key: String,
        load: F,
    ) -> ImResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StorageResult<T>> + Send + 'static,
    {
        let raw = self
            .inner
            .store
            .fetch(
                ctx,
                &key,
                self.inner.ttl,
                loader(move || async move {
                    let value = load().await?;
                    serde_json::to_string(&value)
                        .map_err(|e| StorageError::from_json("encode cache value", e))
                }),
            )
            .await
            .map_err(|source| match source {
                StorageError::NotFound { .. } => ImError::not_found(entity, id),
                source => ImError::Store { operation: "fetch", key: key.clone(), source },
            })?;

        serde_json::from_str(&raw).map_err(|e| ImError::Store {
            operation: "decode cache value",
            key,
            source: StorageError::from_json("decode cache value", e),
        })
    }

    /// Tags `keys` for a direct `del_*` call, attempting all of them.
    async fn tag(&self, ctx: &RequestContext, keys: &[String]) -> ImResult<()> {
        if ctx.is_cancelled() {
            return Err(ImError::Store {
                operation: "tag_as_deleted",
                key: keys.join(","),
                source: StorageError::cancelled(),
            });
        }
        let mut first_error = None;
        for key in keys {
            if let Err(source) = self.inner.store.tag_as_deleted(key).await {
                tracing::warn!(key = %key, error = %source, "tag_as_deleted failed");
                first_error.get_or_insert(ImError::Store {
                    operation: "tag_as_deleted",
                    key: key.clone(),
                    source,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
