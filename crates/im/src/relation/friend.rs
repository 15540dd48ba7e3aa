use pigeon_storage::{StorageBackend, StorageResult};

use super::{Tx, keys, read, scan, scan_ids, tx_insert, tx_modify, tx_read};
use crate::model::{Black, Friend};

#[derive(Debug, Clone)]
pub struct FriendRepo<S> {
    backend: S,
}

impl<S: StorageBackend> FriendRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn friend_ids(&self, owner: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::friends_of(owner)).await
    }

    pub async fn friends(&self, owner: &str) -> StorageResult<Vec<Friend>> {
        scan(&self.backend, &keys::friends_of(owner)).await
    }

    /// `owner`'s rows for the given friends, skipping non-friends.
    pub async fn find(&self, owner: &str, friend_ids: &[String]) -> StorageResult<Vec<Friend>> {
        let mut found = Vec::with_capacity(friend_ids.len());
        for id in friend_ids {
            if let Some(row) = read(&self.backend, &keys::friend(owner, id)).await? {
                found.push(row);
            }
        }
        Ok(found)
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> FriendTx<'t> {
        FriendTx { tx }
    }
}

pub struct FriendTx<'t> {
    tx: &'t mut Tx,
}

impl FriendTx<'_> {
    pub async fn exists(&self, owner: &str, friend: &str) -> StorageResult<bool> {
        Ok(tx_read::<Friend>(&*self.tx, &keys::friend(owner, friend)).await?.is_some())
    }

    pub async fn create(&mut self, friends: &[Friend]) -> StorageResult<()> {
        for row in friends {
            tx_insert(self.tx, keys::friend(&row.owner_user_id, &row.friend_user_id), row).await?;
        }
        Ok(())
    }

    pub fn delete(&mut self, owner: &str, friend_ids: &[String]) {
        for id in friend_ids {
            self.tx.delete(keys::friend(owner, id));
        }
    }

    /// Returns `false` if `owner` has no row for `friend`.
    pub async fn update_remark(
        &mut self,
        owner: &str,
        friend: &str,
        remark: &str,
    ) -> StorageResult<bool> {
        tx_modify(self.tx, keys::friend(owner, friend), |row: &mut Friend| {
            row.remark = remark.to_owned();
        })
        .await
    }
}

#[derive(Debug, Clone)]
pub struct BlackRepo<S> {
    backend: S,
}

impl<S: StorageBackend> BlackRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn black_ids(&self, owner: &str) -> StorageResult<Vec<String>> {
        scan_ids(&self.backend, &keys::blacks_of(owner)).await
    }

    pub async fn blacks(&self, owner: &str) -> StorageResult<Vec<Black>> {
        scan(&self.backend, &keys::blacks_of(owner)).await
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> BlackTx<'t> {
        BlackTx { tx }
    }
}

pub struct BlackTx<'t> {
    tx: &'t mut Tx,
}

impl BlackTx<'_> {
    pub async fn create(&mut self, blacks: &[Black]) -> StorageResult<()> {
        for row in blacks {
            tx_insert(self.tx, keys::black(&row.owner_user_id, &row.block_user_id), row).await?;
        }
        Ok(())
    }

    pub fn delete(&mut self, owner: &str, blocked_ids: &[String]) {
        for id in blocked_ids {
            self.tx.delete(keys::black(owner, id));
        }
    }
}
