//! Transaction manager.
//!
//! ```
//! use pigeon_im::relation::TxManager;
//! use pigeon_storage::{MemoryBackend, RequestContext, StorageBackend, StorageError};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//! let manager = TxManager::new(backend.clone());
//! let ctx = RequestContext::background();
//!
//! let result: Result<(), StorageError> = manager
//!     .transaction(&ctx, |tx| Box::pin(async move {
//!         tx.set(b"a".to_vec(), b"1".to_vec());
//!         Err(StorageError::internal("abort"))
//!     }))
//!     .await;
//!
//! assert!(result.is_err());
//! assert!(backend.get(b"a").await.unwrap().is_none());
//! # });
//! ```

use fail::fail_point;
use pigeon_cache::BoxFuture;
use pigeon_storage::{RequestContext, StorageBackend, StorageError, Transaction};

/// Transaction handle passed to the closure of [`TxManager::transaction`].
pub type Tx = Box<dyn Transaction>;

/// Runs closures inside a backend transaction.
#[derive(Debug, Clone)]
pub struct TxManager<S> {
    backend: S,
}

impl<S: StorageBackend> TxManager<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Runs `work` with a fresh transaction and commits if it returns `Ok`.
    ///
    /// The transaction is dropped without committing, which discards every
    /// buffered write, when `work` fails, panics, or `ctx` is cancelled
    /// first. A failed commit is returned as is and not retried.
    #[tracing::instrument(name = "transaction", skip_all, fields(operation_id = ctx.operation_id()))]
    pub async fn transaction<T, E, F>(&self, ctx: &RequestContext, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, E>>,
        E: From<StorageError>,
    {
        if ctx.is_cancelled() {
            return Err(StorageError::cancelled().into());
        }

        let mut tx = self.backend.transaction().await?;
        let outcome = tokio::select! {
            biased;
            () = ctx.cancelled() => None,
            result = work(&mut tx) => Some(result),
        };

        let value = match outcome {
            None => {
                tracing::debug!("request cancelled, rolling back");
                return Err(StorageError::cancelled().into());
            },
            Some(Err(err)) => {
                tracing::debug!("transaction body failed, rolling back");
                return Err(err);
            },
            Some(Ok(value)) => value,
        };

        fail_point!("tx-before-commit", |_| Err(E::from(StorageError::internal(
            "injected failure before commit"
        ))));

        tx.commit().await?;
        Ok(value)
    }
}
