use pigeon_storage::{StorageBackend, StorageResult};

use super::{Tx, encode, keys, take};
use crate::model::ExtendMsg;

#[derive(Debug, Clone)]
pub struct ExtendMsgRepo<S> {
    backend: S,
}

impl<S: StorageBackend> ExtendMsgRepo<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub async fn take(&self, client_msg_id: &str) -> StorageResult<ExtendMsg> {
        take(&self.backend, &keys::extend_msg(client_msg_id)).await
    }

    pub fn new_tx<'t>(&self, tx: &'t mut Tx) -> ExtendMsgTx<'t> {
        ExtendMsgTx { tx }
    }
}

pub struct ExtendMsgTx<'t> {
    tx: &'t mut Tx,
}

impl ExtendMsgTx<'_> {
    /// Inserts or replaces the message extension.
    pub fn upsert(&mut self, msg: &ExtendMsg) -> StorageResult<()> {
        self.tx.set(keys::extend_msg(&msg.client_msg_id), encode(msg)?);
        Ok(())
    }
}
