//! Per-owner conversation rows.

use pigeon_storage::{StorageBackend, StorageResult};

use super::{Tx, keys, read, scan, scan_ids, take, tx_insert, tx_modify, tx_read};
use crate::model::{Conversation, ConversationPatch, RecvMsgOpt, SessionType};

#[derive(Debug, Clone)]
pub struct ConversationRepo<S> {
    backend: S,
}

impl<S: StorageBackend> ConversationRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn take(&self, owner: &str, conversation_id: &str) -> StorageResult<Conversation> {
        take(&self.backend, &keys::conversation(owner, conversation_id)).await
    }

    /// `owner`'s rows among `conversation_ids`; missing IDs are skipped.
    pub async fn find(
        &self,
        owner: &str,
        conversation_ids: &[String],
    ) -> StorageResult<Vec<Conversation>> {
        let mut found = Vec::with_capacity(conversation_ids.len());
        for id in conversation_ids {
            if let Some(row) = read(&self.backend, &keys::conversation(owner, id)).await? {
                found.push(row);
            }
        }
        Ok(found)
    }

    /// Owners among `owners` that have a row for `conversation_id`.
    pub async fn find_user_id(
        &self,
        owners: &[String],
        conversation_id: &str,
    ) -> StorageResult<Vec<String>> {
        let mut have = Vec::new();
        for owner in owners {
            if self.backend.get(&keys::conversation(owner, conversation_id)).await?.is_some() {
                have.push(owner.clone());
            }
        }
        Ok(have)
    }

    pub async fn find_all_conversation_ids(&self, owner: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::conversations_of(owner)).await
    }

    /// Members of super group `group_id` who muted its push notifications.
    pub async fn find_recv_msg_not_notify_user_ids(
        &self,
        group_id: &str,
    ) -> StorageResult<Vec<String>> {
        let rows: Vec<Conversation> = scan(&self.backend, &keys::conversation_table()).await?;
        Ok(rows
            .into_iter()
            .filter(|c| {
                c.group_id == group_id
                    && c.conversation_type == SessionType::SuperGroup
                    && c.recv_msg_opt == RecvMsgOpt::ReceiveNotNotify
            })
            .map(|c| c.owner_user_id)
            .collect())
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> ConversationTx<'t> {
        ConversationTx { tx }
    }
}

/// Transaction-bound conversation writes. Reads here see the
/// transaction's own rewrites.
pub struct ConversationTx<'t> {
    tx: &'t mut Tx,
}

impl ConversationTx<'_> {
    pub async fn find(
        &self,
        owner: &str,
        conversation_ids: &[String],
    ) -> StorageResult<Vec<Conversation>> {
        let mut found = Vec::with_capacity(conversation_ids.len());
        for id in conversation_ids {
            if let Some(row) = tx_read(&*self.tx, &keys::conversation(owner, id)).await? {
                found.push(row);
            }
        }
        Ok(found)
    }

    pub async fn find_user_id(
        &self,
        owners: &[String],
        conversation_id: &str,
    ) -> StorageResult<Vec<String>> {
        let mut have = Vec::new();
        for owner in owners {
            if self.tx.get(&keys::conversation(owner, conversation_id)).await?.is_some() {
                have.push(owner.clone());
            }
        }
        Ok(have)
    }

    /// Inserts new rows; an existing `(owner, conversation_id)` is a conflict.
    pub async fn create(&mut self, conversations: &[Conversation]) -> StorageResult<()> {
        for row in conversations {
            tx_insert(self.tx, keys::conversation(&row.owner_user_id, &row.conversation_id), row).await?;
        }
        Ok(())
    }

    /// Updates existing rows in place with the non-default fields of each
    /// incoming row (see [`Conversation::merge_set_fields`]). Rows that do
    /// not exist are skipped.
    pub async fn update(&mut self, conversations: &[Conversation]) -> StorageResult<()> {
        for row in conversations {
            let key = keys::conversation(&row.owner_user_id, &row.conversation_id);
            tx_modify(self.tx, key, |stored: &mut Conversation| stored.merge_set_fields(row)).await?;
        }
        Ok(())
    }

    /// Applies `patch` to each owner's row, leaving unmentioned fields as they
    /// were. Returns the owners whose row existed.
    pub async fn update_by_patch(
        &mut self,
        owners: &[String],
        conversation_id: &str,
        patch: &ConversationPatch,
    ) -> StorageResult<Vec<String>> {
        let mut updated = Vec::with_capacity(owners.len());
        for owner in owners {
            let key = keys::conversation(owner, conversation_id);
            if tx_modify(self.tx, key, |row: &mut Conversation| patch.apply(row)).await? {
                updated.push(owner.clone());
            }
        }
        Ok(updated)
    }
}
