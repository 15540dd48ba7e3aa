use pigeon_storage::{RequestContext, StorageBackend, StorageError};

use super::{ensure_present, ensure_unique};
use crate::{
    cache::EntityCache,
    error::{ImError, ImResult},
    model::User,
    relation::{TxManager, UserRepo},
};

pub struct UserDatabase<S> {
    repo: UserRepo<S>,
    cache: EntityCache<S>,
    tx: TxManager<S>,
}

impl<S: StorageBackend + Clone + 'static> UserDatabase<S> {
    pub fn new(repo: UserRepo<S>, cache: EntityCache<S>, tx: TxManager<S>) -> Self {
        Self { repo, cache, tx }
    }

    /// Registers new users. An ID that is already taken fails the batch.
    #[tracing::instrument(skip_all, fields(count = users.len()))]
    pub async fn create_users(&self, ctx: &RequestContext, users: Vec<User>) -> ImResult<()> {
        for user in &users {
            ensure_present("user_id", &user.user_id)?;
        }
        ensure_unique("user_ids", users.iter().map(|u| u.user_id.as_str()))?;
        if users.is_empty() {
            return Ok(());
        }

        let repo = self.repo.clone();
        let ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).create(&users).await.map_err(|e| match e {
                        StorageError::Conflict => ImError::validation("user already registered"),
                        e => ImError::store("create", "user")(e),
                    })
                })
            })
            .await?;

        self.cache.invalidation().each(&ids, |b, id| b.user_info(id)).apply("create_users").await
    }

    /// Replaces a user's profile, keeping its creation time.
    #[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
    pub async fn update_user(&self, ctx: &RequestContext, user: &User) -> ImResult<()> {
        ensure_present("user_id", &user.user_id)?;
        let repo = self.repo.clone();
        let row = user.clone();
        let found = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).update(&row).await.map_err(ImError::store("update", &row.user_id))
                })
            })
            .await?;
        if !found {
            return Err(ImError::not_found("user", user.user_id.as_str()));
        }

        self.cache.invalidation().user_info(&user.user_id).apply("update_user").await
    }

    pub async fn get_user(&self, ctx: &RequestContext, user_id: &str) -> ImResult<User> {
        self.cache.get_user_info(ctx, user_id).await
    }
}
