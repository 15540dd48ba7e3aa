use std::collections::HashMap;

use pigeon_storage::{RequestContext, StorageBackend};

use super::{EntityCache, keys};
use crate::{error::ImResult, model::User};

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub async fn get_user_info(&self, ctx: &RequestContext, user_id: &str) -> ImResult<User> {
        let users = self.repos().users.clone();
        let id = user_id.to_owned();
        self.fetch_json(ctx, "user", user_id, keys::user_info(user_id), move || async move {
            users.take(&id).await
        })
        .await
    }

    /// All users or an error; a single missing user fails the call.
    pub async fn get_users_info(
        &self,
        ctx: &RequestContext,
        user_ids: &[String],
    ) -> ImResult<Vec<User>> {
        let mut users = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            users.push(self.get_user_info(ctx, id).await?);
        }
        Ok(users)
    }

    /// Users keyed by ID.
    ///
    /// Unknown users are left out unless `complete` is set, in which case
    /// the first one fails the call. Any other error always fails it.
    pub async fn get_users_info_map(
        &self,
        ctx: &RequestContext,
        user_ids: &[String],
        complete: bool,
    ) -> ImResult<HashMap<String, User>> {
        let mut users = HashMap::with_capacity(user_ids.len());
        for id in user_ids {
            match self.get_user_info(ctx, id).await {
                Ok(user) => {
                    users.insert(id.clone(), user);
                },
                Err(err) if err.is_not_found() && !complete => {},
                Err(err) => return Err(err),
            }
        }
        Ok(users)
    }

    pub async fn del_user_info(&self, ctx: &RequestContext, user_id: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::user_info(user_id)]).await
    }
}
