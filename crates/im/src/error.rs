//! Error types for the IM data layer.
//!
//! Store failures keep their [`StorageError`] source together with the
//! operation and key that hit them. Validation errors are raised before any
//! store access. [`ImError::Invalidation`] is the one error returned after a
//! write has already committed.

use pigeon_storage::StorageError;
use thiserror::Error;

/// Result alias used throughout `pigeon-im`.
pub type ImResult<T> = Result<T, ImError>;

/// Errors returned by repositories, entity caches and use cases.
///
/// This enum is `#[non_exhaustive]`; downstream matches need a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImError {
    /// No matching row exists. Never cached.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A cache or relational store call failed.
    #[error("{operation} failed for {key}: {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("duplicate ids in {field}")]
    DuplicateIds { field: &'static str },

    #[error("a user cannot befriend or block themselves")]
    CannotAddSelf,

    #[error("relationship already exists")]
    RelationshipExists,

    /// The write committed, but some dependent cache entries could not be
    /// tagged. They stay stale until their TTL runs out.
    #[error("{operation} committed but {} cache invalidation(s) failed: {source}", keys.len())]
    Invalidation {
        operation: &'static str,
        /// Keys whose invalidation failed.
        keys: Vec<String>,
        #[source]
        source: StorageError,
    },
}

impl ImError {
    /// Returns a `map_err` adapter that attaches operation and key context.
    pub fn store(
        operation: &'static str,
        key: impl Into<String>,
    ) -> impl FnOnce(StorageError) -> Self {
        let key = key.into();
        move |source| match source {
            StorageError::NotFound { key } => Self::NotFound { entity: "record", id: key },
            source => Self::Store { operation, key, source },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the underlying write is durable despite the error.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Invalidation { .. })
    }

    /// Lowers the error back to the store layer, for use inside cache
    /// loaders that call other cached accessors.
    #[must_use]
    pub fn into_storage(self) -> StorageError {
        match self {
            Self::NotFound { entity, id } => StorageError::not_found(format!("{entity}:{id}")),
            Self::Store { source, .. } | Self::Invalidation { source, .. } => source,
            other => StorageError::internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ImError {
    fn from(source: StorageError) -> Self {
        ImError::store("transaction", "")(source)
    }
}
