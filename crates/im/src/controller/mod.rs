//! Write use cases.
//!
//! Every write runs in one [`TxManager`](crate::relation::TxManager)
//! transaction and tags the dependent cache keys only after the commit
//! succeeded. Tagging earlier would let a concurrent reader repopulate the
//! cache from pre-commit rows. A failed tag after commit surfaces as
//! [`ImError::Invalidation`](crate::ImError::Invalidation); the write stays.

mod conversation;
mod extend_msg;
mod friend;
mod group;
mod user;

use std::collections::HashSet;

pub use conversation::ConversationDatabase;
pub use extend_msg::ExtendMsgDatabase;
pub use friend::FriendDatabase;
pub use group::GroupDatabase;
use pigeon_storage::{RequestContext, StorageError};
pub use user::UserDatabase;

use crate::error::{ImError, ImResult};

/// Rejects `ids` if any value repeats.
fn ensure_unique<'a>(field: &'static str, ids: impl IntoIterator<Item = &'a str>) -> ImResult<()> {
    let mut seen = HashSet::new();
    if ids.into_iter().all(|id| seen.insert(id)) { Ok(()) } else { Err(ImError::DuplicateIds { field }) }
}

fn ensure_present(field: &str, value: &str) -> ImResult<()> {
    if value.is_empty() { Err(ImError::validation(format!("{field} is required"))) } else { Ok(()) }
}

fn ensure_live(ctx: &RequestContext, operation: &'static str) -> ImResult<()> {
    if ctx.is_cancelled() {
        return Err(ImError::Store { operation, key: String::new(), source: StorageError::cancelled() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_rejected() {
        assert!(ensure_unique("user_ids", ["a", "b", "c"]).is_ok());
        assert!(matches!(
            ensure_unique("user_ids", ["a", "b", "a"]),
            Err(ImError::DuplicateIds { field: "user_ids" })
        ));
    }

    #[test]
    fn blank_values_are_rejected() {
        assert!(ensure_present("group_id", "g1").is_ok());
        assert!(matches!(ensure_present("group_id", ""), Err(ImError::Validation(_))));
    }
}
