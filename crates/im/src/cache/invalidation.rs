//! Post-commit invalidation batches.

use std::{collections::BTreeSet, sync::Arc};

use pigeon_cache::CacheStore;

use super::keys;
use crate::error::{ImError, ImResult};

/// A set of cache keys to tag once a write has committed.
///
/// Keys are deduplicated, so each is tagged at most once per batch no
/// matter how many rows depend on it.
#[must_use = "an invalidation batch does nothing until applied"]
pub struct Invalidation {
    store: Arc<dyn CacheStore>,
    keys: BTreeSet<String>,
}

impl Invalidation {
    pub(crate) fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store, keys: BTreeSet::new() }
    }

    fn key(mut self, key: String) -> Self {
        self.keys.insert(key);
        self
    }

    pub fn user_info(self, user_id: &str) -> Self {
        self.key(keys::user_info(user_id))
    }

    pub fn friend_id_list(self, owner: &str) -> Self {
        self.key(keys::friend_id_list(owner))
    }

    pub fn all_friends_info(self, owner: &str) -> Self {
        self.key(keys::all_friends_info(owner))
    }

    pub fn black_id_list(self, owner: &str) -> Self {
        self.key(keys::black_id_list(owner))
    }

    pub fn group_info(self, group_id: &str) -> Self {
        self.key(keys::group_info(group_id))
    }

    pub fn joined_group_id_list(self, user_id: &str) -> Self {
        self.key(keys::joined_group_id_list(user_id))
    }

    /// The member-ID list and the fingerprint derived from it.
    pub fn group_member_id_list(self, group_id: &str) -> Self {
        self.key(keys::group_member_id_list(group_id)).key(keys::group_member_list_hash(group_id))
    }

    pub fn group_member_info(self, group_id: &str, user_id: &str) -> Self {
        self.key(keys::group_member_info(group_id, user_id))
    }

    pub fn all_group_members_info(self, group_id: &str) -> Self {
        self.key(keys::all_group_members_info(group_id))
    }

    pub fn group_member_num(self, group_id: &str) -> Self {
        self.key(keys::group_member_num(group_id))
    }

    pub fn group_member_list_hash(self, group_id: &str) -> Self {
        self.key(keys::group_member_list_hash(group_id))
    }

    pub fn joined_super_group_id_list(self, user_id: &str) -> Self {
        self.key(keys::joined_super_group_id_list(user_id))
    }

    pub fn conversation(self, owner: &str, conversation_id: &str) -> Self {
        self.key(keys::conversation(owner, conversation_id))
    }

    pub fn conversation_id_list(self, owner: &str) -> Self {
        self.key(keys::conversation_id_list(owner))
    }

    pub fn extend_msg(self, client_msg_id: &str) -> Self {
        self.key(keys::extend_msg(client_msg_id))
    }

    /// Adds one key per item, e.g. every member's joined-group list.
    pub fn each<I, T>(self, items: I, add: impl Fn(Self, &T) -> Self) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        items.into_iter().fold(self, |batch, item| add(batch, &item))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Tags every key, attempting all of them even after failures.
    ///
    /// Must only be called after the write it belongs to has committed. On
    /// failure the returned [`ImError::Invalidation`] lists the keys that
    /// stayed untagged.
    #[tracing::instrument(name = "invalidate", skip(self), fields(keys = self.keys.len()))]
    pub async fn apply(self, operation: &'static str) -> ImResult<()> {
        let mut failed = Vec::new();
        let mut first_error = None;
        for key in self.keys {
            if let Err(err) = self.store.tag_as_deleted(&key).await {
                tracing::warn!(operation, key = %key, error = %err, "invalidation after commit failed");
                first_error.get_or_insert(err);
                failed.push(key);
            }
        }
        match first_error {
            None => Ok(()),
            Some(source) => Err(ImError::Invalidation { operation, keys: failed, source }),
        }
    }
}
