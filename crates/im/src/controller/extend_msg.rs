use pigeon_storage::{RequestContext, StorageBackend};

use super::ensure_present;
use crate::{
    cache::EntityCache,
    error::{ImError, ImResult},
    model::ExtendMsg,
    relation::{ExtendMsgRepo, TxManager},
};

/// Message reactions and other per-message extensions.
pub struct ExtendMsgDatabase<S> {
    repo: ExtendMsgRepo<S>,
    cache: EntityCache<S>,
    tx: TxManager<S>,
}

impl<S: StorageBackend + Clone + 'static> ExtendMsgDatabase<S> {
    pub fn new(repo: ExtendMsgRepo<S>, cache: EntityCache<S>, tx: TxManager<S>) -> Self {
        Self { repo, cache, tx }
    }

    /// Inserts or replaces the extension of one message.
    #[tracing::instrument(skip_all, fields(client_msg_id = %msg.client_msg_id))]
    pub async fn set_extend_msg(&self, ctx: &RequestContext, msg: &ExtendMsg) -> ImResult<()> {
        ensure_present("client_msg_id", &msg.client_msg_id)?;
        let repo = self.repo.clone();
        let row = msg.clone();
        self.tx
            .transaction(ctx, move |tx| {
                Box::pin(async move {
                    repo.new_tx(tx).upsert(&row).map_err(ImError::store("upsert", &row.client_msg_id))
                })
            })
            .await?;

        self.cache.invalidation().extend_msg(&msg.client_msg_id).apply("set_extend_msg").await
    }

    pub async fn get_extend_msg(
        &self,
        ctx: &RequestContext,
        client_msg_id: &str,
    ) -> ImResult<ExtendMsg> {
        self.cache.get_extend_msg(ctx, client_msg_id).await
    }
}
