//! Configuration for the fetch-through cache.
//!
//! [`CacheConfig`] is built either through its validating builder or
//! deserialized (durations in humantime form, e.g. `"3s"`) and then checked
//! with [`CacheConfig::validate`].
//!
//! ```
//! use std::time::Duration;
//!
//! use pigeon_cache::CacheConfig;
//!
//! let config = CacheConfig::builder()
//!     .lock_sleep(Duration::from_millis(20))
//!     .strong_consistency(true)
//!     .build()?;
//! assert_eq!(config.lock_expire(), Duration::from_secs(3));
//! # Ok::<(), pigeon_storage::ConfigError>(())
//! ```

use std::time::Duration;

use pigeon_storage::ConfigError;
use serde::{Deserialize, Serialize};

const DEFAULT_LOCK_EXPIRE: Duration = Duration::from_secs(3);
const DEFAULT_LOCK_SLEEP: Duration = Duration::from_millis(100);
const DEFAULT_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_RANDOM_EXPIRE_ADJUSTMENT: f64 = 0.2;

const MIN_LOCK_EXPIRE: Duration = Duration::from_millis(100);
const MIN_LOCK_SLEEP: Duration = Duration::from_millis(1);

fn default_lock_expire() -> Duration {
    DEFAULT_LOCK_EXPIRE
}

fn default_lock_sleep() -> Duration {
    DEFAULT_LOCK_SLEEP
}

fn default_delay() -> Duration {
    DEFAULT_DELAY
}

fn default_random_expire_adjustment() -> f64 {
    DEFAULT_RANDOM_EXPIRE_ADJUSTMENT
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(50)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(2)
}

/// Bounded retry policy for background maintenance such as bulk clears.
#[derive(Debug, Clone, PartialEq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    #[builder(default = default_max_retries())]
    pub max_retries: u32,

    #[serde(with = "humantime_serde", default = "default_initial_backoff")]
    #[builder(default = default_initial_backoff())]
    pub initial_backoff: Duration,

    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    #[builder(default = default_max_backoff())]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// Tuning for [`FetchCache`](crate::FetchCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a recompute lock is honoured. A crashed holder's lock lapses
    /// after this and another caller takes over.
    #[serde(with = "humantime_serde", default = "default_lock_expire")]
    pub(crate) lock_expire: Duration,

    /// Poll interval while another caller holds the lock.
    #[serde(with = "humantime_serde", default = "default_lock_sleep")]
    pub(crate) lock_sleep: Duration,

    /// How long a tombstoned value stays available for serve-stale.
    #[serde(with = "humantime_serde", default = "default_delay")]
    pub(crate) delay: Duration,

    /// TTL jitter band; `0.2` means each TTL is scaled by a factor in `[0.8, 1.2]`.
    #[serde(default = "default_random_expire_adjustment")]
    pub(crate) random_expire_adjustment: f64,

    /// Never serve tombstoned values; wait for the recompute instead.
    #[serde(default)]
    pub(crate) strong_consistency: bool,

    #[serde(default)]
    pub(crate) clear_retry: RetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_expire: DEFAULT_LOCK_EXPIRE,
            lock_sleep: DEFAULT_LOCK_SLEEP,
            delay: DEFAULT_DELAY,
            random_expire_adjustment: DEFAULT_RANDOM_EXPIRE_ADJUSTMENT,
            strong_consistency: false,
            clear_retry: RetryConfig::default(),
        }
    }
}

#[bon::bon]
impl CacheConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `lock_expire` is below 100ms
    /// - `lock_sleep` is below 1ms or not shorter than `lock_expire`
    /// - `random_expire_adjustment` is outside `[0, 1)`
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_LOCK_EXPIRE)] lock_expire: Duration,
        #[builder(default = DEFAULT_LOCK_SLEEP)] lock_sleep: Duration,
        #[builder(default = DEFAULT_DELAY)] delay: Duration,
        #[builder(default = DEFAULT_RANDOM_EXPIRE_ADJUSTMENT)] random_expire_adjustment: f64,
        #[builder(default)] strong_consistency: bool,
        #[builder(default)] clear_retry: RetryConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            lock_expire,
            lock_sleep,
            delay,
            random_expire_adjustment,
            strong_consistency,
            clear_retry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_expire < MIN_LOCK_EXPIRE {
            return Err(ConfigError::BelowMinimum {
                field: "lock_expire",
                min: format!("{MIN_LOCK_EXPIRE:?}"),
                value: format!("{:?}", self.lock_expire),
            });
        }
        if self.lock_sleep < MIN_LOCK_SLEEP {
            return Err(ConfigError::BelowMinimum {
                field: "lock_sleep",
                min: format!("{MIN_LOCK_SLEEP:?}"),
                value: format!("{:?}", self.lock_sleep),
            });
        }
        if self.lock_sleep >= self.lock_expire {
            return Err(ConfigError::Invalid {
                field: "lock_sleep",
                reason: "must be shorter than lock_expire".into(),
            });
        }
        if !(0.0..1.0).contains(&self.random_expire_adjustment) {
            return Err(ConfigError::Invalid {
                field: "random_expire_adjustment",
                reason: format!("{} is outside [0, 1)", self.random_expire_adjustment),
            });
        }
        if self.clear_retry.initial_backoff > self.clear_retry.max_backoff {
            return Err(ConfigError::Invalid {
                field: "clear_retry.initial_backoff",
                reason: "must not exceed max_backoff".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn lock_expire(&self) -> Duration {
        self.lock_expire
    }

    #[must_use]
    pub fn lock_sleep(&self) -> Duration {
        self.lock_sleep
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn random_expire_adjustment(&self) -> f64 {
        self.random_expire_adjustment
    }

    #[must_use]
    pub fn strong_consistency(&self) -> bool {
        self.strong_consistency
    }

    #[must_use]
    pub fn clear_retry(&self) -> &RetryConfig {
        &self.clear_retry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        assert_eq!(CacheConfig::builder().build().unwrap(), CacheConfig::default());
    }

    #[test]
    fn rejects_tiny_lock_expire() {
        let err = CacheConfig::builder().lock_expire(Duration::from_millis(10)).build().unwrap_err();
        assert!(matches!(err, ConfigError::BelowMinimum { field: "lock_expire", .. }));
    }

    #[test]
    fn rejects_sleep_not_shorter_than_lock() {
        let err = CacheConfig::builder()
            .lock_expire(Duration::from_millis(200))
            .lock_sleep(Duration::from_millis(200))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lock_sleep", .. }));
    }

    #[test]
    fn rejects_out_of_band_jitter() {
        for bad in [-0.1, 1.0, 3.0, f64::NAN] {
            let result = CacheConfig::builder().random_expire_adjustment(bad).build();
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn deserializes_humantime_with_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"lock_sleep":"25ms","strong_consistency":true}"#).unwrap();
        assert_eq!(config.lock_sleep(), Duration::from_millis(25));
        assert_eq!(config.delay(), Duration::from_secs(10));
        assert!(config.strong_consistency());
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<CacheConfig, _> = serde_json::from_str(r#"{"lock_sleeep":"25ms"}"#);
        assert!(result.is_err());
    }
}
