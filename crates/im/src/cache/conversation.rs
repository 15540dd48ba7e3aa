use pigeon_storage::{RequestContext, StorageBackend};

use super::{EntityCache, keys};
use crate::{error::ImResult, model::Conversation};

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub async fn get_conversation(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversation_id: &str,
    ) -> ImResult<Conversation> {
        let conversations = self.repos().conversations.clone();
        let (owner_id, id) = (owner.to_owned(), conversation_id.to_owned());
        let key = keys::conversation(owner, conversation_id);
        self.fetch_json(ctx, "conversation", conversation_id, key, move || async move {
            conversations.take(&owner_id, &id).await
        })
        .await
    }

    /// Every requested conversation or an error.
    pub async fn get_conversations(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversation_ids: &[String],
    ) -> ImResult<Vec<Conversation>> {
        let mut found = Vec::with_capacity(conversation_ids.len());
        for id in conversation_ids {
            found.push(self.get_conversation(ctx, owner, id).await?);
        }
        Ok(found)
    }

    pub async fn get_user_conversation_id_list(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<String>> {
        let conversations = self.repos().conversations.clone();
        let owner_id = owner.to_owned();
        let key = keys::conversation_id_list(owner);
        self.fetch_json(ctx, "conversation list", owner, key, move || async move {
            conversations.find_all_conversation_ids(&owner_id).await
        })
        .await
    }

    /// Resolves the owner's ID list, then each conversation; any failure
    /// fails the call.
    pub async fn get_user_all_conversations(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<Conversation>> {
        let ids = self.get_user_conversation_id_list(ctx, owner).await?;
        self.get_conversations(ctx, owner, &ids).await
    }

    pub async fn del_conversation(
        &self,
        ctx: &RequestContext,
        owner: &str,
        conversation_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::conversation(owner, conversation_id)]).await
    }

    pub async fn del_users_conversation(
        &self,
        ctx: &RequestContext,
        owners: &[String],
        conversation_id: &str,
    ) -> ImResult<()> {
        let tagged: Vec<String> = owners.iter().map(|o| keys::conversation(o, conversation_id)).collect();
        self.tag(ctx, &tagged).await
    }

    pub async fn del_user_conversation_id_list(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::conversation_id_list(owner)]).await
    }
}
