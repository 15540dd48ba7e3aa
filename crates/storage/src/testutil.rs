//! Shared test utilities for code built on [`StorageBackend`](crate::StorageBackend).
//!
//! Feature-gated behind `testutil` so none of this leaks into production
//! builds:
//!
//! ```toml
//! [dev-dependencies]
//! pigeon-storage = { workspace = true, features = ["testutil"] }
//! ```

/// `count` distinct user IDs `"{prefix}{idx}"`.
#[must_use]
pub fn make_ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

/// Assert that a result is a [`StorageError::Conflict`](crate::StorageError::Conflict).
///
/// The expression is evaluated once, so it may be an `.await`.
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        match $result {
            Err($crate::StorageError::Conflict) => {},
            other => panic!("expected StorageError::Conflict, got: {other:?}"),
        }
    };
}

/// Assert that a result is a [`StorageError::NotFound`](crate::StorageError::NotFound).
///
/// The expression is evaluated once, so it may be an `.await`.
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        match $result {
            Err($crate::StorageError::NotFound { .. }) => {},
            other => panic!("expected StorageError::NotFound, got: {other:?}"),
        }
    };
}
