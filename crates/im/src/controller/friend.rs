use std::collections::BTreeSet;

use chrono::Utc;
use pigeon_storage::{RequestContext, StorageBackend, StorageError};

use super::{ensure_present, ensure_unique};
use crate::{
    cache::EntityCache,
    error::{ImError, ImResult},
    model::{Black, Friend},
    relation::{BlackRepo, FriendRepo, TxManager},
};

/// Friend and blacklist writes.
pub struct FriendDatabase<S> {
    friends: FriendRepo<S>,
    blacks: BlackRepo<S>,
    cache: EntityCache<S>,
    tx: TxManager<S>,
}

fn validate_targets(owner: &str, targets: &[String]) -> ImResult<()> {
    ensure_present("owner_user_id", owner)?;
    if targets.iter().any(|t| t == owner) {
        return Err(ImError::CannotAddSelf);
    }
    ensure_unique("friend_user_ids", targets.iter().map(String::as_str))
}

impl<S: StorageBackend + Clone + 'static> FriendDatabase<S> {
    pub fn new(
        friends: FriendRepo<S>,
        blacks: BlackRepo<S>,
        cache: EntityCache<S>,
        tx: TxManager<S>,
    ) -> Self {
        Self { friends, blacks, cache, tx }
    }

    /// Whether `user2` is in `user1`'s list and whether `user1` is in
    /// `user2`'s, read through the cached friend-ID lists.
    pub async fn check_in(
        &self,
        ctx: &RequestContext,
        user1: &str,
        user2: &str,
    ) -> ImResult<(bool, bool)> {
        let of_user1 = self.cache.get_friend_id_list(ctx, user1).await?;
        let of_user2 = self.cache.get_friend_id_list(ctx, user2).await?;
        Ok((of_user1.iter().any(|id| id == user2), of_user2.iter().any(|id| id == user1)))
    }

    /// Creates both directions of each friendship. Directions that already
    /// exist are left as they are.
    #[tracing::instrument(skip(self, ctx, friend_ids), fields(count = friend_ids.len()))]
    pub async fn become_friends(
        &self,
        ctx: &RequestContext,
        owner: &str,
        friend_ids: &[String],
        add_source: i32,
        op_user: &str,
    ) -> ImResult<()> {
        validate_targets(owner, friend_ids)?;
        if friend_ids.is_empty() {
            return Ok(());
        }

        let repo = self.friends.clone();
        let (owner_id, targets, operator) = (owner.to_owned(), friend_ids.to_vec(), op_user.to_owned());
        let touched = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    let mut rows = repo.new_tx(tx);
                    let now = Utc::now();
                    let row = |from: &str, to: &str| Friend {
                        owner_user_id: from.to_owned(),
                        friend_user_id: to.to_owned(),
                        add_source,
                        operator_user_id: operator.clone(),
                        create_time: now,
                        ..Friend::default()
                    };

                    let mut created = Vec::new();
                    for target in &targets {
                        for (from, to) in [(&owner_id, target), (target, &owner_id)] {
                            if !rows.exists(from, to).await.map_err(ImError::store("exists", from))? {
                                created.push(row(from, to));
                            }
                        }
                    }
                    rows.create(&created).await.map_err(ImError::store("create", &owner_id))?;
                    let touched: BTreeSet<String> = created.into_iter().map(|f| f.owner_user_id).collect();
                    Ok::<_, ImError>(touched)
                })
            })
            .await?;

        self.cache
            .invalidation()
            .each(&touched, |b, user| b.friend_id_list(user).all_friends_info(user))
            .apply("become_friends")
            .await
    }

    /// [`become_friends`](Self::become_friends) after checking that every
    /// user involved exists.
    pub async fn import_friends(
        &self,
        ctx: &RequestContext,
        owner: &str,
        friend_ids: &[String],
        add_source: i32,
        op_user: &str,
    ) -> ImResult<()> {
        validate_targets(owner, friend_ids)?;
        let everyone: Vec<String> =
            std::iter::once(owner.to_owned()).chain(friend_ids.iter().cloned()).collect();
        self.cache.get_users_info(ctx, &everyone).await?;
        self.become_friends(ctx, owner, friend_ids, add_source, op_user).await
    }

    /// Removes `owner`'s side of each friendship.
    pub async fn delete_friends(
        &self,
        ctx: &RequestContext,
        owner: &str,
        friend_ids: &[String],
    ) -> ImResult<()> {
        ensure_present("owner_user_id", owner)?;
        let repo = self.friends.clone();
        let (owner_id, targets) = (owner.to_owned(), friend_ids.to_vec());
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).delete(&owner_id, &targets);
                    Ok::<_, ImError>(())
                })
            })
            .await?;

        self.cache
            .invalidation()
            .friend_id_list(owner)
            .all_friends_info(owner)
            .apply("delete_friends")
            .await
    }

    pub async fn update_remark(
        &self,
        ctx: &RequestContext,
        owner: &str,
        friend: &str,
        remark: &str,
    ) -> ImResult<()> {
        let repo = self.friends.clone();
        let (owner_id, friend_id, remark) = (owner.to_owned(), friend.to_owned(), remark.to_owned());
        let found = self
            .tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx)
                        .update_remark(&owner_id, &friend_id, &remark)
                        .await
                        .map_err(ImError::store("update_remark", &owner_id))
                })
            })
            .await?;
        if !found {
            return Err(ImError::not_found("friend", friend));
        }

        self.cache.invalidation().all_friends_info(owner).apply("update_remark").await
    }

    /// `owner`'s rows for every ID in `friend_ids`; any non-friend fails the
    /// call.
    pub async fn find_friends_with_error(
        &self,
        ctx: &RequestContext,
        owner: &str,
        friend_ids: &[String],
    ) -> ImResult<Vec<Friend>> {
        super::ensure_live(ctx, "find_friends")?;
        let found =
            self.friends.find(owner, friend_ids).await.map_err(ImError::store("find", owner))?;
        if let Some(missing) =
            friend_ids.iter().find(|id| !found.iter().any(|f| &f.friend_user_id == *id))
        {
            return Err(ImError::not_found("friend", missing.as_str()));
        }
        Ok(found)
    }

    pub async fn add_black(
        &self,
        ctx: &RequestContext,
        owner: &str,
        blocked: &str,
        add_source: i32,
        op_user: &str,
    ) -> ImResult<()> {
        ensure_present("block_user_id", blocked)?;
        validate_targets(owner, &[blocked.to_owned()])?;

        let repo = self.blacks.clone();
        let row = Black {
            owner_user_id: owner.to_owned(),
            block_user_id: blocked.to_owned(),
            add_source,
            operator_user_id: op_user.to_owned(),
            create_time: Utc::now(),
            ..Black::default()
        };
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).create(std::slice::from_ref(&row)).await.map_err(|e| match e {
                        StorageError::Conflict => ImError::RelationshipExists,
                        e => ImError::store("create", &row.owner_user_id)(e),
                    })
                })
            })
            .await?;

        self.cache.invalidation().black_id_list(owner).apply("add_black").await
    }

    pub async fn remove_black(
        &self,
        ctx: &RequestContext,
        owner: &str,
        blocked_ids: &[String],
    ) -> ImResult<()> {
        ensure_present("owner_user_id", owner)?;
        let repo = self.blacks.clone();
        let (owner_id, targets) = (owner.to_owned(), blocked_ids.to_vec());
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).delete(&owner_id, &targets);
                    Ok::<_, ImError>(())
                })
            })
            .await?;

        self.cache.invalidation().black_id_list(owner).apply("remove_black").await
    }
}
