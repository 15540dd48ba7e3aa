//! Groups, per-member rows and super-group documents.
//!
//! Normal groups keep one row per member plus a `joined_group` index per
//! user. Super groups keep the whole member list in one document plus a
//! `user_super_group` index per user. Index rows carry no payload.

use pigeon_storage::{StorageBackend, StorageResult};

use super::{Tx, encode, keys, read, scan, scan_ids, take, tx_insert, tx_modify, tx_read};
use crate::model::{Group, GroupMember, GroupStatus, GroupType, SuperGroup};

const INDEX_MARKER: &[u8] = b"{}";

#[derive(Debug, Clone)]
pub struct GroupRepo<S> {
    backend: S,
}

impl<S: StorageBackend> GroupRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn take(&self, group_id: &str) -> StorageResult<Group> {
        take(&self.backend, &keys::group(group_id)).await
    }

    pub async fn take_member(&self, group_id: &str, user_id: &str) -> StorageResult<GroupMember> {
        take(&self.backend, &keys::group_member(group_id, user_id)).await
    }

    pub async fn members(&self, group_id: &str) -> StorageResult<Vec<GroupMember>> {
        scan(&self.backend, &keys::members_of(group_id)).await
    }

    pub async fn member_ids(&self, group_id: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::members_of(group_id)).await
    }

    pub async fn joined_group_ids(&self, user_id: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::joined_groups_of(user_id)).await
    }

    /// Member IDs of `group`, from the super-group document for super groups
    /// and from the member rows otherwise.
    pub async fn member_ids_of(&self, group: &Group) -> StorageResult<Vec<String>> {
        match group.group_type {
            GroupType::Super => Ok(self.take_super_group(&group.group_id).await?.member_ids),
            GroupType::Normal => self.member_ids(&group.group_id).await,
        }
    }

    pub async fn take_super_group(&self, group_id: &str) -> StorageResult<SuperGroup> {
        take(&self.backend, &keys::super_group(group_id)).await
    }

    pub async fn find_super_group(&self, group_id: &str) -> StorageResult<Option<SuperGroup>> {
        read(&self.backend, &keys::super_group(group_id)).await
    }

    pub async fn joined_super_group_ids(&self, user_id: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::super_groups_of(user_id)).await
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> GroupTx<'t> {
        GroupTx { tx }
    }
}

pub struct GroupTx<'t> {
    tx: &'t mut Tx,
}

impl GroupTx<'_> {
    pub async fn find(&self, group_id: &str) -> StorageResult<Option<Group>> {
        tx_read(&*self.tx, &keys::group(group_id)).await
    }

    pub async fn create(&mut self, group: &Group) -> StorageResult<()> {
        tx_insert(self.tx, keys::group(&group.group_id), group).await
    }

    /// Returns `false` if the group does not exist.
    pub async fn set_status(&mut self, group_id: &str, status: GroupStatus) -> StorageResult<bool> {
        tx_modify(self.tx, keys::group(group_id), |group: &mut Group| group.status = status).await
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> StorageResult<bool> {
        Ok(self.tx.get(&keys::group_member(group_id, user_id)).await?.is_some())
    }

    pub async fn add_members(&mut self, members: &[GroupMember]) -> StorageResult<()> {
        for member in members {
            tx_insert(self.tx, keys::group_member(&member.group_id, &member.user_id), member).await?;
            self.tx.set(keys::joined_group(&member.user_id, &member.group_id), INDEX_MARKER.to_vec());
        }
        Ok(())
    }

    pub fn remove_members(&mut self, group_id: &str, user_ids: &[String]) {
        for user_id in user_ids {
            self.tx.delete(keys::group_member(group_id, user_id));
            self.tx.delete(keys::joined_group(user_id, group_id));
        }
    }

    /// Writes the super-group document and brings the per-user index in
    /// line with it. Returns the previous member list.
    pub async fn put_super_group(&mut self, group: &SuperGroup) -> StorageResult<Vec<String>> {
        let previous: Option<SuperGroup> = tx_read(&*self.tx, &keys::super_group(&group.group_id)).await?;
        let previous = previous.map(|g| g.member_ids).unwrap_or_default();

        for gone in previous.iter().filter(|id| !group.member_ids.contains(id)) {
            self.tx.delete(keys::user_super_group(gone, &group.group_id));
        }
        for member in &group.member_ids {
            self.tx.set(keys::user_super_group(member, &group.group_id), INDEX_MARKER.to_vec());
        }
        self.tx.set(keys::super_group(&group.group_id), encode(group)?);
        Ok(previous)
    }
}
