//! Relational store: typed repositories over a [`StorageBackend`].
//!
//! Rows are JSON documents under the keys built in [`keys`]. Every
//! repository is a cheap `Clone` handle. Reads go straight to the backend;
//! writes go through a handle bound to a transaction with `new_tx`, so the
//! only way to mutate rows is inside [`TxManager::transaction`].

mod conversation;
mod extend_msg;
mod friend;
mod group;
pub(crate) mod keys;
mod tx;
mod user;

pub use conversation::{ConversationRepo, ConversationTx};
pub use extend_msg::{ExtendMsgRepo, ExtendMsgTx};
pub use friend::{BlackRepo, BlackTx, FriendRepo, FriendTx};
pub use group::{GroupRepo, GroupTx};
use pigeon_storage::{StorageBackend, StorageError, StorageResult, prefix_range};
use serde::{Serialize, de::DeserializeOwned};
pub use tx::{Tx, TxManager};
pub use user::{UserRepo, UserTx};

/// Every repository over one backend.
#[derive(Debug, Clone)]
pub struct Repos<S> {
    pub users: UserRepo<S>,
    pub friends: FriendRepo<S>,
    pub blacks: BlackRepo<S>,
    pub groups: GroupRepo<S>,
    pub conversations: ConversationRepo<S>,
    pub extend_msgs: ExtendMsgRepo<S>,
}

impl<S: StorageBackend + Clone> Repos<S> {
    pub fn new(backend: S) -> Self {
        Self {
            users: UserRepo::new(backend.clone()),
            friends: FriendRepo::new(backend.clone()),
            blacks: BlackRepo::new(backend.clone()),
            groups: GroupRepo::new(backend.clone()),
            conversations: ConversationRepo::new(backend.clone()),
            extend_msgs: ExtendMsgRepo::new(backend),
        }
    }
}

fn encode<T: Serialize>(doc: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| StorageError::from_json("encode row", e))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(raw).map_err(|e| StorageError::from_json("decode row", e))
}

async fn read<S: StorageBackend, T: DeserializeOwned>(
    backend: &S,
    key: &[u8],
) -> StorageResult<Option<T>> {
    backend.get(key).await?.map(|raw| decode(&raw)).transpose()
}

/// Like [`read`], but a missing row is [`StorageError::NotFound`].
async fn take<S: StorageBackend, T: DeserializeOwned>(backend: &S, key: &[u8]) -> StorageResult<T> {
    read(backend, key).await?.ok_or_else(|| StorageError::not_found(keys::display(key)))
}

async fn scan<S: StorageBackend, T: DeserializeOwned>(
    backend: &S,
    prefix: &[u8],
) -> StorageResult<Vec<T>> {
    backend.get_range(prefix_range(prefix)).await?.iter().map(|kv| decode(&kv.value)).collect()
}

/// IDs stored as the last key segment under `prefix`, in key order.
async fn scan_ids<S: StorageBackend>(backend: &S, prefix: &[u8]) -> StorageResult<Vec<String>> {
    let rows = backend.get_range(prefix_range(prefix)).await?;
    rows.iter()
        .map(|kv| {
            keys::last_segment(&kv.key).ok_or_else(|| {
                StorageError::serialization(format!("malformed key {}", keys::display(&kv.key)))
            })
        })
        .collect()
}

async fn tx_read<T: DeserializeOwned>(
    tx: &Tx,
    key: &[u8],
) -> StorageResult<Option<T>> {
    tx.get(key).await?.map(|raw| decode(&raw)).transpose()
}

/// Buffers an insert. Fails with [`StorageError::Conflict`] if the row
/// exists now, or at commit if a concurrent writer creates it first.
async fn tx_insert<T: Serialize>(tx: &mut Tx, key: Vec<u8>, doc: &T) -> StorageResult<()> {
    if tx.get(&key).await?.is_some() {
        return Err(StorageError::conflict());
    }
    tx.compare_and_set(key, None, encode(doc)?)
}

/// Rewrites an existing row. The commit fails with a conflict if another
/// writer changed the row after it was read here.
///
/// Returns `false` when the row does not exist.
async fn tx_modify<T, F>(tx: &mut Tx, key: Vec<u8>, modify: F) -> StorageResult<bool>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut T),
{
    let Some(raw) = tx.get(&key).await? else {
        return Ok(false);
    };
    let mut doc: T = decode(&raw)?;
    modify(&mut doc);
    tx.compare_and_set(key, Some(raw.to_vec()), encode(&doc)?)?;
    Ok(true)
}
