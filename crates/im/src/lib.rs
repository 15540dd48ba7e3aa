//! Cache-consistency and transactional-sync core of the pigeon IM backend.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ controller   ConversationDatabase, FriendDatabase, ...       │
//! │              transaction, then post-commit invalidation      │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │ cache        EntityCache     │ relation   repositories,      │
//! │              get_* / del_*   │            TxManager          │
//! ├──────────────────────────────┼───────────────────────────────┤
//! │ pigeon-cache  CacheStore     │ pigeon-storage  Transaction   │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! Reads go through [`EntityCache`], which serves JSON values from a
//! [`CacheStore`](pigeon_cache::CacheStore) and recomputes them from the
//! repositories under single-flight. Writes go through the use cases in
//! [`controller`]: each one runs a single transaction and tags the cache
//! keys that depend on the rows it changed once the commit succeeded.
//!
//! # Feature Flags
//!
//! - **`testutil`**: in-memory [`testutil::Stack`] with recording and failure-injecting cache
//!   decorators.
//! - **`failpoints`**: enables the `tx-before-commit` fail point and the cache crate's points.

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod hash;
pub mod ids;
pub mod model;
pub mod relation;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub mod testutil;

pub use cache::{EntityCache, Invalidation};
pub use config::ServiceConfig;
pub use controller::{
    ConversationDatabase, ExtendMsgDatabase, FriendDatabase, GroupDatabase, UserDatabase,
};
pub use error::{ImError, ImResult};
pub use hash::{DISMISSED_FINGERPRINT, group_fingerprint, member_list_hash};
pub use model::{
    Black, Conversation, ConversationPatch, ExtendMsg, Friend, Group, GroupMember, GroupStatus,
    GroupType, RecvMsgOpt, RoleLevel, SessionType, SuperGroup, User,
};
pub use relation::{Repos, Tx, TxManager};
