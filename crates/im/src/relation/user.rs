use pigeon_storage::{StorageBackend, StorageResult};

use super::{Tx, keys, read, take, tx_insert, tx_modify};
use crate::model::User;

#[derive(Debug, Clone)]
pub struct UserRepo<S> {
    backend: S,
}

impl<S: StorageBackend> UserRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn take(&self, user_id: &str) -> StorageResult<User> {
        take(&self.backend, &keys::user(user_id)).await
    }

    /// Users that exist among `user_ids`, in request order.
    pub async fn find(&self, user_ids: &[String]) -> StorageResult<Vec<User>> {
        let mut users = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            if let Some(user) = read(&self.backend, &keys::user(id)).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> UserTx<'t> {
        UserTx { tx }
    }
}

/// Write side of [`UserRepo`] bound to a transaction.
pub struct UserTx<'t> {
    tx: &'t mut Tx,
}

impl UserTx<'_> {
    pub async fn create(&mut self, users: &[User]) -> StorageResult<()> {
        for user in users {
            tx_insert(self.tx, keys::user(&user.user_id), user).await?;
        }
        Ok(())
    }

    /// Replaces the stored profile. Returns `false` if the user is unknown.
    pub async fn update(&mut self, user: &User) -> StorageResult<bool> {
        tx_modify(self.tx, keys::user(&user.user_id), |stored: &mut User| {
            let create_time = stored.create_time;
            *stored = user.clone();
            stored.create_time = create_time;
        })
        .await
    }
}
