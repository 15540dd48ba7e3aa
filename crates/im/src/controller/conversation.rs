//! Conversation sync engine.
//!
//! Most writes are an upsert by template inside one transaction: owners that
//! already have a row get a partial update, the others get a copy of the
//! template with their own ID. After commit, every updated owner's
//! conversation entry is tagged and every owner that gained a row also has
//! their conversation-ID list tagged. The two are separate namespaces; a
//! new row changes the list as well as the record.

use std::collections::HashSet;

use pigeon_storage::{RequestContext, StorageBackend};

use super::{ensure_live, ensure_present, ensure_unique};
use crate::{
    cache::EntityCache,
    error::{ImError, ImResult},
    ids,
    model::{Conversation, ConversationPatch, SessionType},
    relation::{ConversationRepo, TxManager},
};

/// Rows a write touched, keyed by owner or by conversation ID.
#[derive(Debug, Default)]
struct Upserted {
    updated: Vec<String>,
    inserted: Vec<String>,
}

pub struct ConversationDatabase<S> {
    repo: ConversationRepo<S>,
    cache: EntityCache<S>,
    tx: TxManager<S>,
}

impl<S: StorageBackend + Clone + 'static> ConversationDatabase<S> {
    pub fn new(repo: ConversationRepo<S>, cache: EntityCache<S>, tx: TxManager<S>) -> Self {
        Self { repo, cache, tx }
    }

    /// Runs the upsert for `owners` on one conversation and returns which
    /// owners were updated and which got a new row.
    async fn upsert_by_template<F>(
        &self,
        ctx: &RequestContext,
        owners: Vec<String>,
        conversation_id: String,
        patch: ConversationPatch,
        template: F,
    ) -> ImResult<Upserted>
    where
        F: Fn(&str) -> Conversation + Send + 'static,
    {
        let repo = self.repo.clone();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    let mut rows = repo.new_tx(tx);
                    let have = rows
                        .find_user_id(&owners, &conversation_id)
                        .await
                        .map_err(ImError::store("find_user_id", &conversation_id))?;

                    let updated = if have.is_empty() {
                        Vec::new()
                    } else {
                        rows.update_by_patch(&have, &conversation_id, &patch)
                            .await
                            .map_err(ImError::store("update_by_patch", &conversation_id))?
                    };

                    let have: HashSet<&str> = have.iter().map(String::as_str).collect();
                    let inserted: Vec<String> =
                        owners.iter().filter(|o| !have.contains(o.as_str())).cloned().collect();
                    let new_rows: Vec<Conversation> = inserted
                        .iter()
                        .map(|owner| {
                            let mut row = template(owner);
                            row.owner_user_id.clone_from(owner);
                            row.conversation_id.clone_from(&conversation_id);
                            patch.apply(&mut row);
                            row
                        })
                        .collect();
                    rows.create(&new_rows).await.map_err(ImError::store("create", &conversation_id))?;

                    Ok(Upserted { updated, inserted })
                })
            })
            .await
    }

    async fn invalidate_upsert(
        &self,
        operation: &'static str,
        conversation_id: &str,
        upserted: &Upserted,
    ) -> ImResult<()> {
        self.cache
            .invalidation()
            .each(&upserted.updated, |b, owner| b.conversation(owner, conversation_id))
            .each(&upserted.inserted, |b, owner| {
                b.conversation(owner, conversation_id).conversation_id_list(owner)
            })
            .apply(operation)
            .await
    }

    /// Inserts new conversation rows. An existing `(owner, conversation_id)`
    /// fails the whole batch.
    #[tracing::instrument(skip_all, fields(count = conversations.len()))]
    pub async fn create_conversations(
        &self,
        ctx: &RequestContext,
        conversations: Vec<Conversation>,
    ) -> ImResult<()> {
        for c in &conversations {
            ensure_present("owner_user_id", &c.owner_user_id)?;
            ensure_present("conversation_id", &c.conversation_id)?;
        }
        let pairs: Vec<String> =
            conversations.iter().map(|c| format!("{}\n{}", c.owner_user_id, c.conversation_id)).collect();
        ensure_unique("conversations", pairs.iter().map(String::as_str))?;

        let repo = self.repo.clone();
        let rows = conversations.clone();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).create(&rows).await.map_err(ImError::store("create", "conversation"))
                })
            })
            .await?;

        self.cache
            .invalidation()
            .each(&conversations, |b, c| {
                b.conversation(&c.owner_user_id, &c.conversation_id).conversation_id_list(&c.owner_user_id)
            })
            .apply("create_conversations")
            .await
    }

    /// Applies `patch` to every owner in `owners` that has a row for
    /// `template.conversation_id` and creates the row from `template` for
    /// the rest.
    #[tracing::instrument(
        skip_all,
        fields(conversation_id = %template.conversation_id, owners = owners.len())
    )]
    pub async fn set_users_conversation_field_tx(
        &self,
        ctx: &RequestContext,
        owners: &[String],
        template: &Conversation,
        patch: &ConversationPatch,
    ) -> ImResult<()> {
        ensure_present("conversation_id", &template.conversation_id)?;
        ensure_unique("user_ids", owners.iter().map(String::as_str))?;
        if owners.is_empty() {
            return Ok(());
        }

        let conversation_id = template.conversation_id.clone();
        let base = template.clone();
        let upserted = self
            .upsert_by_template(ctx, owners.to_vec(), conversation_id.clone(), patch.clone(), move |_| {
                base.clone()
            })
            .await?;
        self.invalidate_upsert("set_users_conversation_field_tx", &conversation_id, &upserted).await
    }

    /// Creates `owner`'s missing rows and updates the existing ones in place
    /// with each incoming row's non-default fields.
    #[tracing::instrument(skip_all, fields(owner = %owner, count = conversations.len()))]
    pub async fn set_user_conversations(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversations: Vec<Conversation>,
    ) -> ImResult<()> {
        ensure_present("owner_user_id", owner)?;
        let mut conversations = conversations;
        for c in &mut conversations {
            ensure_present("conversation_id", &c.conversation_id)?;
            if c.owner_user_id.is_empty() {
                c.owner_user_id = owner.to_owned();
            } else if c.owner_user_id != owner {
                return Err(ImError::validation(format!(
                    "conversation {} belongs to {}, not {owner}",
                    c.conversation_id, c.owner_user_id
                )));
            }
        }
        ensure_unique("conversation_ids", conversations.iter().map(|c| c.conversation_id.as_str()))?;
        if conversations.is_empty() {
            return Ok(());
        }

        let repo = self.repo.clone();
        let owner_id = owner.to_owned();
        let upserted = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    let mut rows = repo.new_tx(tx);
                    let ids: Vec<String> =
                        conversations.iter().map(|c| c.conversation_id.clone()).collect();
                    let existing: HashSet<String> = rows
                        .find(&owner_id, &ids)
                        .await
                        .map_err(ImError::store("find", &owner_id))?
                        .into_iter()
                        .map(|c| c.conversation_id)
                        .collect();

                    let (update, create): (Vec<Conversation>, Vec<Conversation>) =
                        conversations.into_iter().partition(|c| existing.contains(&c.conversation_id));
                    rows.update(&update).await.map_err(ImError::store("update", &owner_id))?;
                    rows.create(&create).await.map_err(ImError::store("create", &owner_id))?;

                    Ok::<_, ImError>(Upserted {
                        updated: update.into_iter().map(|c| c.conversation_id).collect(),
                        inserted: create.into_iter().map(|c| c.conversation_id).collect(),
                    })
                })
            })
            .await?;

        let mut batch = self
            .cache
            .invalidation()
            .each(upserted.updated.iter().chain(&upserted.inserted), |b, id| b.conversation(owner, id));
        if !upserted.inserted.is_empty() {
            batch = batch.conversation_id_list(owner);
        }
        batch.apply("set_user_conversations").await
    }

    /// Propagates `conversation.is_private_chat` to both participants of a
    /// one-to-one chat, creating the peer's row if they never had one.
    #[tracing::instrument(
        skip_all,
        fields(owner = %conversation.owner_user_id, peer = %conversation.user_id)
    )]
    pub async fn sync_peer_user_private_conversation_tx(
        &self,
        ctx: &RequestContext,
        conversation: &Conversation,
    ) -> ImResult<()> {
        if conversation.conversation_type != SessionType::Single {
            return Err(ImError::validation("private chat sync only applies to single chats"));
        }
        let owner = conversation.owner_user_id.clone();
        let peer = conversation.user_id.clone();
        ensure_present("owner_user_id", &owner)?;
        ensure_present("user_id", &peer)?;
        if owner == peer {
            return Err(ImError::CannotAddSelf);
        }

        let conversation_id = ids::single_chat_id(&owner, &peer);
        if !conversation.conversation_id.is_empty() && conversation.conversation_id != conversation_id {
            return Err(ImError::validation(format!(
                "conversation_id {} does not match the pair, expected {conversation_id}",
                conversation.conversation_id
            )));
        }

        let patch = ConversationPatch::builder().is_private_chat(conversation.is_private_chat).build();
        let own_row = conversation.clone();
        let flag = conversation.is_private_chat;
        let owner_id = owner.clone();
        let upserted = self
            .upsert_by_template(ctx, vec![owner, peer], conversation_id.clone(), patch, move |who| {
                if who == owner_id {
                    own_row.clone()
                } else {
                    Conversation {
                        conversation_type: SessionType::Single,
                        user_id: owner_id.clone(),
                        is_private_chat: flag,
                        ..Conversation::default()
                    }
                }
            })
            .await?;
        tracing::debug!(
            updated = upserted.updated.len(),
            inserted = upserted.inserted.len(),
            "private chat flag synced"
        );
        self.invalidate_upsert("sync_peer_user_private_conversation_tx", &conversation_id, &upserted).await
    }

    /// Applies `patch` to the rows that exist; owners without a row are
    /// left alone.
    #[tracing::instrument(skip_all, fields(conversation_id = %conversation_id, owners = owners.len()))]
    pub async fn update_users_conversation_field(
        &self,
        ctx: &RequestContext,
        owners: &[String],
        conversation_id: &str,
        patch: &ConversationPatch,
    ) -> ImResult<()> {
        ensure_present("conversation_id", conversation_id)?;
        ensure_unique("user_ids", owners.iter().map(String::as_str))?;
        if owners.is_empty() || patch.is_empty() {
            return Ok(());
        }

        let repo = self.repo.clone();
        let (owners_owned, id, patch) = (owners.to_vec(), conversation_id.to_owned(), patch.clone());
        let updated = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx)
                        .update_by_patch(&owners_owned, &id, &patch)
                        .await
                        .map_err(ImError::store("update_by_patch", &id))
                })
            })
            .await?;

        self.cache
            .invalidation()
            .each(&updated, |b, owner| b.conversation(owner, conversation_id))
            .apply("update_users_conversation_field")
            .await
    }

    /// Owners among `owners` that have a row for `conversation_id`.
    pub async fn get_user_id_exist_conversation(
        &self,
        ctx: &RequestContext,
        owners: &[String],
        conversation_id: &str,
    ) -> ImResult<Vec<String>> {
        ensure_live(ctx, "find_user_id")?;
        self.repo
            .find_user_id(owners, conversation_id)
            .await
            .map_err(ImError::store("find_user_id", conversation_id))
    }

    pub async fn find_conversations(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversation_ids: &[String],
    ) -> ImResult<Vec<Conversation>> {
        self.cache.get_conversations(ctx, owner, conversation_ids).await
    }

    pub async fn get_conversation(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversation_id: &str,
    ) -> ImResult<Conversation> {
        self.cache.get_conversation(ctx, owner, conversation_id).await
    }

    pub async fn get_user_all_conversations(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<Conversation>> {
        self.cache.get_user_all_conversations(ctx, owner).await
    }

    /// Members of super group `group_id` who muted its notifications.
    pub async fn find_recv_msg_not_notify_user_ids(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<Vec<String>> {
        ensure_live(ctx, "find_recv_msg_not_notify_user_ids")?;
        self.repo
            .find_recv_msg_not_notify_user_ids(group_id)
            .await
            .map_err(ImError::store("find_recv_msg_not_notify_user_ids", group_id))
    }
}
