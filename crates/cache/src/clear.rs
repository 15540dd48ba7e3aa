//! Bulk removal of cache namespaces.
//!
//! Clearing is maintenance work: it retries transient failures a bounded
//! number of times, logs what it could not remove, and reports back. It
//! never aborts the process.

use pigeon_storage::StorageError;

use crate::{config::RetryConfig, retry::with_retry, store::CacheStore};

/// A key or prefix that could not be cleared.
#[derive(Debug, Clone)]
pub struct ClearFailure {
    /// The key, or the prefix when the scan itself failed.
    pub target: String,
    pub error: StorageError,
}

/// Outcome of [`clear_prefixes`].
#[derive(Debug, Clone, Default)]
pub struct ClearReport {
    pub deleted: usize,
    pub failed: Vec<ClearFailure>,
}

impl ClearReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Converts an incomplete report into the first failure's error.
    pub fn into_result(self) -> Result<usize, StorageError> {
        match self.failed.into_iter().next() {
            None => Ok(self.deleted),
            Some(failure) => Err(failure.error),
        }
    }
}

/// Deletes every key under each of `prefixes`.
///
/// Keys that still fail after `retry.max_retries` retries are recorded in the
/// report and the sweep moves on to the next key.
#[tracing::instrument(skip(store, retry), fields(prefixes = prefixes.len()))]
pub async fn clear_prefixes(
    store: &dyn CacheStore,
    prefixes: &[&str],
    retry: &RetryConfig,
) -> ClearReport {
    let mut report = ClearReport::default();

    for prefix in prefixes {
        let keys = match with_retry(retry, "scan_prefix", || store.scan_prefix(prefix)).await {
            Ok(keys) => keys,
            Err(error) => {
                tracing::error!(prefix, error = %error, "giving up scanning cache prefix");
                report.failed.push(ClearFailure { target: (*prefix).to_owned(), error });
                continue;
            },
        };

        for key in keys {
            match with_retry(retry, "delete", || store.delete(&key)).await {
                Ok(()) => report.deleted += 1,
                Err(error) => {
                    tracing::error!(key = %key, error = %error, "giving up deleting cache key");
                    report.failed.push(ClearFailure { target: key, error });
                },
            }
        }
    }

    tracing::debug!(deleted = report.deleted, failed = report.failed.len(), "cache clear finished");
    report
}
