use pigeon_storage::{RequestContext, StorageBackend};

use super::{EntityCache, keys};
use crate::{error::ImResult, model::ExtendMsg};

impl<S: StorageBackend + Clone + 'static> EntityCache<S> {
    pub async fn get_extend_msg(
        &self,
        ctx: &RequestContext,
        client_msg_id: &str,
    ) -> ImResult<ExtendMsg> {
        let msgs = self.repos().extend_msgs.clone();
        let id = client_msg_id.to_owned();
        let key = keys::extend_msg(client_msg_id);
        self.fetch_json(ctx, "extend message", client_msg_id, key, move || async move {
            msgs.take(&id).await
        })
        .await
    }

    pub async fn del_extend_msg(&self, ctx: &RequestContext, client_msg_id: &str) -> ImResult<()> {
        self.tag(ctx, &[keys::extend_msg(client_msg_id)]).await
    }
}
