//! Group namespaces and the membership fingerprint.
//!
//! The member-ID list of a super group comes from its super-group document;
//! other groups list their member rows. The member count and the
//! fingerprint are recomputed from the relational store, never from the
//! cached list: a tagged list may still be served stale while another
//! caller reloads it, and a count or fingerprint built from that would be
//! stored as fresh.

use pigeon_storage::{RequestContext, StorageBackend};

use super::{EntityCache, keys, loader_context, pagination::page_bounds};
use crate::{
    error::ImResult,
    hash::{DISMISSED_FINGERPRINT, member_list_hash},
    model::{Group, GroupMember, GroupStatus},
};

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub async fn get_group_info(&self, ctx: &RequestContext, group_id: &str) -> ImResult<Group> {
        let groups = self.repos().groups.clone();
        let id = group_id.to_owned();
        self.fetch_json(ctx, "group", group_id, keys::group_info(group_id), move || async move {
            groups.take(&id).await
        })
        .await
    }

    pub async fn get_joined_group_id_list(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ImResult<Vec<String>> {
        let groups = self.repos().groups.clone();
        let id = user_id.to_owned();
        let key = keys::joined_group_id_list(user_id);
        self.fetch_json(ctx, "joined groups", user_id, key, move || async move {
            groups.joined_group_ids(&id).await
        })
        .await
    }

    pub async fn get_joined_super_group_id_list(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ImResult<Vec<String>> {
        let groups = self.repos().groups.clone();
        let id = user_id.to_owned();
        let key = keys::joined_super_group_id_list(user_id);
        self.fetch_json(ctx, "joined super groups", user_id, key, move || async move {
            groups.joined_super_group_ids(&id).await
        })
        .await
    }

    pub async fn get_group_member_id_list(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<Vec<String>> {
        let this = self.clone();
        let inner_ctx = loader_context(ctx);
        let id = group_id.to_owned();
        self.fetch_json(ctx, "group", group_id, keys::group_member_id_list(group_id), move || async move {
            // The group type never changes, so a cached group row is good enough here.
            let group = this.get_group_info(&inner_ctx, &id).await.map_err(|e| e.into_storage())?;
            this.repos().groups.member_ids_of(&group).await
        })
        .await
    }

    pub async fn get_group_member_info(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_id: &str,
    ) -> ImResult<GroupMember> {
        let groups = self.repos().groups.clone();
        let (gid, uid) = (group_id.to_owned(), user_id.to_owned());
        let key = keys::group_member_info(group_id, user_id);
        self.fetch_json(ctx, "group member", user_id, key, move || async move {
            groups.take_member(&gid, &uid).await
        })
        .await
    }

    /// One page of member profiles.
    ///
    /// Members whose profile cannot be loaded are logged and left out; the
    /// page itself only fails if the member-ID list cannot be resolved.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_group_members_info(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        offset: i32,
        count: i32,
    ) -> ImResult<Vec<GroupMember>> {
        let member_ids = self.get_group_member_id_list(ctx, group_id).await?;
        let page = &member_ids[page_bounds(member_ids.len(), offset, count)];

        let mut members = Vec::with_capacity(page.len());
        for user_id in page {
            match self.get_group_member_info(ctx, group_id, user_id).await {
                Ok(member) => members.push(member),
                Err(err) => {
                    tracing::warn!(user_id = %user_id, error = %err, "skipping group member");
                },
            }
        }
        Ok(members)
    }

    pub async fn get_all_group_members_info(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<Vec<GroupMember>> {
        let groups = self.repos().groups.clone();
        let id = group_id.to_owned();
        self.fetch_json(ctx, "group", group_id, keys::all_group_members_info(group_id), move || async move {
            groups.members(&id).await
        })
        .await
    }

    pub async fn get_group_member_num(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<u64> {
        let groups = self.repos().groups.clone();
        let id = group_id.to_owned();
        self.fetch_json(ctx, "group", group_id, keys::group_member_num(group_id), move || async move {
            let group = groups.take(&id).await?;
            let ids = groups.member_ids_of(&group).await?;
            Ok(u64::try_from(ids.len()).unwrap_or(u64::MAX))
        })
        .await
    }

    /// Membership fingerprint; `0` for a dismissed group.
    pub async fn get_group_member_list_hash(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<u64> {
        let groups = self.repos().groups.clone();
        let id = group_id.to_owned();
        self.fetch_json(ctx, "group", group_id, keys::group_member_list_hash(group_id), move || async move {
            let group = groups.take(&id).await?;
            if group.status == GroupStatus::Dismissed {
                return Ok(DISMISSED_FINGERPRINT);
            }
            let ids = groups.member_ids_of(&group).await?;
            Ok(member_list_hash(&ids))
        })
        .await
    }

    pub async fn del_group_info(&self, ctx: &RequestContext, group_id: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::group_info(group_id)]).await
    }

    pub async fn del_joined_group_id_list(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::joined_group_id_list(user_id)]).await
    }

    pub async fn del_joined_super_group_id_list(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::joined_super_group_id_list(user_id)]).await
    }

    /// Tags the member-ID list and the fingerprint computed from it.
    pub async fn del_group_member_id_list(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::group_member_id_list(group_id), keys::group_member_list_hash(group_id)]).await
    }

    pub async fn del_group_member_info(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::group_member_info(group_id, user_id)]).await
    }

    pub async fn del_all_group_members_info(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::all_group_members_info(group_id)]).await
    }

    pub async fn del_group_member_num(&self, ctx: &RequestContext, group_id: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::group_member_num(group_id)]).await
    }

    pub async fn del_group_member_list_hash(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> ImResult<()> {
        self.tag(ctx, &[keys::group_member_list_hash(group_id)]).await
    }
}
