//! Bounded retry for cache maintenance operations.
//!
//! Only transient errors are retried (see [`StorageError::is_transient`]).
//! Delays grow as `initial_backoff * 2^attempt`, are capped at
//! `max_backoff`, and get 0–50% random jitter on top.

use std::{future::Future, time::Duration};

use fail::fail_point;
use pigeon_storage::{StorageError, StorageResult};
use rand::Rng;

use crate::config::RetryConfig;

/// Runs `operation` until it succeeds, fails permanently, or exhausts
/// `config.max_retries` retries. Returns the last error on exhaustion.
#[tracing::instrument(skip(config, operation), fields(max_retries = config.max_retries))]
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(operation = operation_name, attempt = attempt + 1, "succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = compute_backoff(config, attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient error, retrying after backoff",
                );
                fail_point!("cache-retry-before-sleep", |_| Err(StorageError::internal(
                    "injected failure before retry sleep"
                )));
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

pub(crate) fn compute_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.initial_backoff.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = base.min(config.max_backoff);

    let jitter_range = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX) / 2;
    if jitter_range > 0 {
        capped + Duration::from_millis(rand::rng().random_range(0..=jitter_range))
    } else {
        capped
    }
}
