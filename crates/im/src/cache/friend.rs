use pigeon_storage::{RequestContext, StorageBackend};

use super::{EntityCache, keys};
use crate::{error::ImResult, model::Friend};

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub async fn get_friend_id_list(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<String>> {
        let friends = self.repos().friends.clone();
        let owner_id = owner.to_owned();
        self.fetch_json(ctx, "friend list", owner, keys::friend_id_list(owner), move || async move {
            friends.friend_ids(&owner_id).await
        })
        .await
    }

    pub async fn get_all_friends_info(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<Friend>> {
        let friends = self.repos().friends.clone();
        let owner_id = owner.to_owned();
        self.fetch_json(ctx, "friend list", owner, keys::all_friends_info(owner), move || async move {
            friends.friends(&owner_id).await
        })
        .await
    }

    pub async fn get_black_id_list(
        &self,
        ctx: &RequestContext,
        owner: &str,
    ) -> ImResult<Vec<String>> {
        let blacks = self.repos().blacks.clone();
        let owner_id = owner.to_owned();
        self.fetch_json(ctx, "black list", owner, keys::black_id_list(owner), move || async move {
            blacks.black_ids(&owner_id).await
        })
        .await
    }

    pub async fn del_friend_id_list(&self, ctx: &RequestContext, owner: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::friend_id_list(owner)]).await
    }

    pub async fn del_all_friends_info(&self, ctx: &RequestContext, owner: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::all_friends_info(owner)]).await
    }

    pub async fn del_black_id_list(&self, ctx: &RequestContext, owner: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::black_id_list(owner)]).await
    }
}
