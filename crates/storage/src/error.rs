//! Storage error types and result alias.
//!
//! Every backend maps its internal failures onto [`StorageError`]. Higher
//! layers (the fetch-through cache, the relational repositories) propagate
//! these unchanged or wrap them with operation context; they never invent
//! new storage-level variants.
//!
//! # Example
//!
//! ```
//! use pigeon_storage::{StorageError, StorageResult};
//!
//! fn lookup(key: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(key))
//! }
//!
//! assert!(lookup("user:1").unwrap_err().is_not_found());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Errors preserve their source chain via `#[source]`, so diagnostics can
/// walk down to the backend-specific cause.
///
/// This enum is `#[non_exhaustive]`; downstream matches need a wildcard arm.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The requested key or row does not exist.
    #[error("Key not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A compare-and-set condition did not hold.
    ///
    /// Returned by plain CAS calls and by transaction commits whose buffered
    /// CAS conditions were invalidated by a concurrent writer.
    #[error("Transaction conflict")]
    Conflict,

    /// Network or connection failure talking to the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Data could not be encoded for storage or decoded after retrieval.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Catch-all for backend-specific failures.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation exceeded its time limit.
    #[error("Operation timeout")]
    Timeout,

    /// The request context was cancelled before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict() -> Self {
        Self::Conflict
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error wrapping a `serde_json` failure.
    #[must_use]
    pub fn from_json(context: &str, source: serde_json::Error) -> Self {
        Self::Serialization { message: format!("{context}: {source}"), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Returns `true` for failures that may succeed if retried unchanged.
    ///
    /// Only connection failures and timeouts qualify. Conflicts are excluded
    /// because retrying the same CAS with the same expectation cannot succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while validating configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A value is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Rendered minimum.
        min: String,
        /// Rendered value.
        value: String,
    },

    /// A value is above its allowed maximum.
    #[error("{field} must be at most {max}, got {value}")]
    AboveMaximum {
        /// Name of the offending field.
        field: &'static str,
        /// Rendered maximum.
        max: String,
        /// Rendered value.
        value: String,
    },

    /// A value is structurally invalid.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StorageError::connection("reset").is_transient());
        assert!(StorageError::timeout().is_transient());
        assert!(!StorageError::conflict().is_transient());
        assert!(!StorageError::not_found("k").is_transient());
        assert!(!StorageError::cancelled().is_transient());
        assert!(!StorageError::serialization("bad").is_transient());
    }

    #[test]
    fn source_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err = StorageError::connection_with_source("redis unavailable", io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("peer reset"));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::BelowMinimum { field: "lock_sleep", min: "1ms".into(), value: "0ns".into() };
        assert_eq!(err.to_string(), "lock_sleep must be at least 1ms, got 0ns");
    }
}
