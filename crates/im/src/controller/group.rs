//! Group writes.
//!
//! Membership changes always tag the member-ID list together with its
//! fingerprint and the member count, so the three never disagree for
//! longer than a recompute.

use std::collections::BTreeSet;

use pigeon_storage::{RequestContext, StorageBackend, StorageError};

use super::{ensure_present, ensure_unique};
use crate::{
    cache::{EntityCache, Invalidation},
    error::{ImError, ImResult},
    model::{Group, GroupMember, GroupStatus, GroupType, SuperGroup},
    relation::{GroupRepo, TxManager},
};

pub struct GroupDatabase<S> {
    repo: GroupRepo<S>,
    cache: EntityCache<S>,
    tx: TxManager<S>,
}

/// Keys that depend on who is in `group_id`.
fn membership(batch: Invalidation, group_id: &str, user_ids: &[String]) -> Invalidation {
    batch
        .group_member_id_list(group_id)
        .group_member_num(group_id)
        .all_group_members_info(group_id)
        .each(user_ids, |b, user| b.group_member_info(group_id, user).joined_group_id_list(user))
}

fn check_members(group_id: &str, members: &mut [GroupMember]) -> ImResult<()> {
    for member in members.iter_mut() {
        ensure_present("user_id", &member.user_id)?;
        if member.group_id.is_empty() {
            member.group_id = group_id.to_owned();
        } else if member.group_id != group_id {
            return Err(ImError::validation(format!(
                "member {} belongs to group {}, not {group_id}",
                member.user_id, member.group_id
            )));
        }
    }
    ensure_unique("user_ids", members.iter().map(|m| m.user_id.as_str()))
}

impl<S: StorageBackend + Clone + 'static> GroupDatabase<S> {
    pub fn new(repo: GroupRepo<S>, cache: EntityCache<S>, tx: TxManager<S>) -> Self {
        Self { repo, cache, tx }
    }

    /// Creates the group and its initial members. For a super group the
    /// members go into the super-group document instead of member rows.
    #[tracing::instrument(skip_all, fields(group_id = %group.group_id, members = members.len()))]
    pub async fn create_group(
        &self,
        ctx: &RequestContext,
        group: &Group,
        members: Vec<GroupMember>,
    ) -> ImResult<()> {
        ensure_present("group_id", &group.group_id)?;
        let mut members = members;
        check_members(&group.group_id, &mut members)?;
        let user_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();

        let repo = self.repo.clone();
        let row = group.clone();
        let ids = user_ids.clone();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    let mut rows = repo.new_tx(tx);
                    rows.create(&row).await.map_err(|e| match e {
                        StorageError::Conflict => {
                            ImError::validation(format!("group {} already exists", row.group_id))
                        },
                        e => ImError::store("create", &row.group_id)(e),
                    })?;
                    match row.group_type {
                        GroupType::Super => {
                            let doc = SuperGroup { group_id: row.group_id.clone(), member_ids: ids };
                            rows.put_super_group(&doc)
                                .await
                                .map_err(ImError::store("put_super_group", &row.group_id))?;
                        },
                        GroupType::Normal => rows
                            .add_members(&members)
                            .await
                            .map_err(ImError::store("add_members", &row.group_id))?,
                    }
                    Ok::<_, ImError>(())
                })
            })
            .await?;

        let gid = group.group_id.as_str();
        let batch = membership(self.cache.invalidation().group_info(gid), gid, &user_ids);
        let batch = match group.group_type {
            GroupType::Super => batch.each(&user_ids, |b, user| b.joined_super_group_id_list(user)),
            GroupType::Normal => batch,
        };
        batch.apply("create_group").await
    }

    /// Adds members to a live, normal group. A user who is already a member
    /// fails the whole call.
    #[tracing::instrument(skip_all, fields(group_id = %group_id, members = members.len()))]
    pub async fn add_group_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        members: Vec<GroupMember>,
    ) -> ImResult<()> {
        ensure_present("group_id", group_id)?;
        let mut members = members;
        check_members(group_id, &mut members)?;
        if members.is_empty() {
            return Ok(());
        }
        let user_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();

        let repo = self.repo.clone();
        let gid = group_id.to_owned();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    let mut rows = repo.new_tx(tx);
                    let group = rows
                        .find(&gid)
                        .await
                        .map_err(ImError::store("find", &gid))?
                        .ok_or_else(|| ImError::not_found("group", gid.as_str()))?;
                    if group.status == GroupStatus::Dismissed {
                        return Err(ImError::validation(format!("group {gid} is dismissed")));
                    }
                    if group.group_type == GroupType::Super {
                        return Err(ImError::validation(format!(
                            "group {gid} is a super group; replace its member list instead"
                        )));
                    }
                    for member in &members {
                        let present = rows
                            .is_member(&gid, &member.user_id)
                            .await
                            .map_err(ImError::store("is_member", &gid))?;
                        if present {
                            return Err(ImError::RelationshipExists);
                        }
                    }
                    rows.add_members(&members).await.map_err(ImError::store("add_members", &gid))
                })
            })
            .await?;

        membership(self.cache.invalidation(), group_id, &user_ids).apply("add_group_members").await
    }

    #[tracing::instrument(skip_all, fields(group_id = %group_id, members = user_ids.len()))]
    pub async fn remove_group_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_ids: &[String],
    ) -> ImResult<()> {
        ensure_present("group_id", group_id)?;
        ensure_unique("user_ids", user_ids.iter().map(String::as_str))?;

        let repo = self.repo.clone();
        let (gid, ids) = (group_id.to_owned(), user_ids.to_vec());
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).remove_members(&gid, &ids);
                    Ok::<_, ImError>(())
                })
            })
            .await?;

        membership(self.cache.invalidation(), group_id, user_ids)
            .apply("remove_group_members")
            .await
    }

    /// Marks the group dismissed. Its fingerprint reads as `0` from then on.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn dismiss_group(&self, ctx: &RequestContext, group_id: &str) -> ImResult<()> {
        let repo = self.repo.clone();
        let gid = group_id.to_owned();
        let found = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx)
                        .set_status(&gid, GroupStatus::Dismissed)
                        .await
                        .map_err(ImError::store("set_status", &gid))
                })
            })
            .await?;
        if !found {
            return Err(ImError::not_found("group", group_id));
        }

        self.cache
            .invalidation()
            .group_info(group_id)
            .group_member_list_hash(group_id)
            .apply("dismiss_group")
            .await
    }

    /// Replaces the member list of a super group.
    ///
    /// Users that left and users that joined both get their joined
    /// super-group list tagged.
    #[tracing::instrument(skip_all, fields(group_id = %group_id, members = member_ids.len()))]
    pub async fn create_super_group(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        member_ids: &[String],
    ) -> ImResult<()> {
        ensure_present("group_id", group_id)?;
        ensure_unique("member_ids", member_ids.iter().map(String::as_str))?;

        let repo = self.repo.clone();
        let doc = SuperGroup { group_id: group_id.to_owned(), member_ids: member_ids.to_vec() };
        let previous = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx)
                        .put_super_group(&doc)
                        .await
                        .map_err(ImError::store("put_super_group", &doc.group_id))
                })
            })
            .await?;

        let affected: BTreeSet<&String> = previous.iter().chain(member_ids).collect();
        tracing::debug!(affected = affected.len(), "super group replaced");
        self.cache
            .invalidation()
            .group_member_id_list(group_id)
            .group_member_num(group_id)
            .each(affected, |b, user| b.joined_super_group_id_list(user))
            .apply("create_super_group")
            .await
    }
}
