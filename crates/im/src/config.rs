//! Service-level configuration.
//!
//! ```
//! use std::time::Duration;
//!
//! use pigeon_im::ServiceConfig;
//!
//! let config = ServiceConfig::from_json_str(r#"{"entity_ttl":"10m","cache":{"lock_sleep":"20ms"}}"#)?;
//! assert_eq!(config.entity_ttl(), Duration::from_secs(600));
//! assert_eq!(config.cache().lock_sleep(), Duration::from_millis(20));
//! # Ok::<(), pigeon_storage::ConfigError>(())
//! ```

use std::time::Duration;

use pigeon_cache::CacheConfig;
use pigeon_storage::ConfigError;
use serde::{Deserialize, Serialize};

const DEFAULT_ENTITY_TTL: Duration = Duration::from_secs(30 * 60);
const MIN_ENTITY_TTL: Duration = Duration::from_secs(1);

fn default_entity_ttl() -> Duration {
    DEFAULT_ENTITY_TTL
}

/// Configuration shared by every entity cache namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    cache: CacheConfig,

    /// Base TTL for cached entities before jitter.
    #[serde(with = "humantime_serde", default = "default_entity_ttl")]
    entity_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { cache: CacheConfig::default(), entity_ttl: DEFAULT_ENTITY_TTL }
    }
}

#[bon::bon]
impl ServiceConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `entity_ttl` is under one
    /// second, or whatever [`CacheConfig::validate`] rejects.
    #[builder]
    pub fn new(
        #[builder(default)] cache: CacheConfig,
        #[builder(default = DEFAULT_ENTITY_TTL)] entity_ttl: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { cache, entity_ttl };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ConfigError::Invalid { field: "service", reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_ttl < MIN_ENTITY_TTL {
            return Err(ConfigError::BelowMinimum {
                field: "entity_ttl",
                min: format!("{MIN_ENTITY_TTL:?}"),
                value: format!("{:?}", self.entity_ttl),
            });
        }
        self.cache.validate()
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn entity_ttl(&self) -> Duration {
        self.entity_ttl
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ServiceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.entity_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn rejects_short_ttl() {
        let err = ServiceConfig::builder().entity_ttl(Duration::from_millis(500)).build().unwrap_err();
        assert!(matches!(err, ConfigError::BelowMinimum { field: "entity_ttl", .. }));
    }

    #[test]
    fn nested_cache_config_is_validated() {
        let err = ServiceConfig::from_json_str(r#"{"cache":{"random_expire_adjustment":1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "random_expire_adjustment", .. }));
    }

    #[test]
    fn malformed_json_is_invalid() {
        let err = ServiceConfig::from_json_str(r#"{"entity_ttl":"soon"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "service", .. }));
    }
}
