//! In-memory wiring and cache decorators for tests.
//!
//! ```toml
//! [dev-dependencies]
//! pigeon-im = { workspace = true, features = ["testutil"] }
//! ```
//!
//! [`Stack`] builds every layer over two [`MemoryBackend`]s, one for rows
//! and one for cache entries. The cache store is wrapped as
//! `RecordingCache(FailingCache(FetchCache))`, so a test can both inject
//! invalidation failures and count what reached the store.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use pigeon_cache::{CacheConfig, CacheStore, FetchCache, Loader};
use pigeon_storage::{MemoryBackend, RequestContext, StorageError, StorageResult};

use crate::{
    cache::EntityCache,
    config::ServiceConfig,
    controller::{
        ConversationDatabase, ExtendMsgDatabase, FriendDatabase, GroupDatabase, UserDatabase,
    },
    relation::{Repos, TxManager},
};

/// Counts tags and loader runs per key.
pub struct RecordingCache {
    inner: Arc<dyn CacheStore>,
    tags: Mutex<HashMap<String, usize>>,
    loads: Arc<Mutex<HashMap<String, usize>>>,
}

impl RecordingCache {
    pub fn new(inner: Arc<dyn CacheStore>) -> Self {
        Self { inner, tags: Mutex::default(), loads: Arc::default() }
    }

    /// Successful `tag_as_deleted` calls for `key`.
    pub fn tag_count(&self, key: &str) -> usize {
        self.tags.lock().get(key).copied().unwrap_or(0)
    }

    /// Every key tagged so far, sorted.
    pub fn tagged_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tags.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn total_tags(&self) -> usize {
        self.tags.lock().values().sum()
    }

    /// Loader runs for `key`.
    pub fn load_count(&self, key: &str) -> usize {
        self.loads.lock().get(key).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        self.tags.lock().clear();
        self.loads.lock().clear();
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        loader: Loader,
    ) -> StorageResult<String> {
        let loads = Arc::clone(&self.loads);
        let counted_key = key.to_owned();
        let counted: Loader = Box::new(move || {
            *loads.lock().entry(counted_key).or_insert(0) += 1;
            loader()
        });
        self.inner.fetch(ctx, key, ttl, counted).await
    }

    async fn tag_as_deleted(&self, key: &str) -> StorageResult<()> {
        self.inner.tag_as_deleted(key).await?;
        *self.tags.lock().entry(key.to_owned()).or_insert(0) += 1;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }
}

/// Makes `tag_as_deleted` fail on demand, for every key or for chosen
/// ones. Reads pass through untouched.
pub struct FailingCache {
    inner: Arc<dyn CacheStore>,
    fail_all: AtomicBool,
    fail_keys: Mutex<HashSet<String>>,
}

impl FailingCache {
    pub fn new(inner: Arc<dyn CacheStore>) -> Self {
        Self { inner, fail_all: AtomicBool::new(false), fail_keys: Mutex::default() }
    }

    pub fn fail_all_tags(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_tag(&self, key: impl Into<String>) {
        self.fail_keys.lock().insert(key.into());
    }

    pub fn heal(&self) {
        self.fail_all.store(false, Ordering::SeqCst);
        self.fail_keys.lock().clear();
    }

    fn should_fail(&self, key: &str) -> bool {
        self.fail_all.load(Ordering::SeqCst) || self.fail_keys.lock().contains(key)
    }
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        loader: Loader,
    ) -> StorageResult<String> {
        self.inner.fetch(ctx, key, ttl, loader).await
    }

    async fn tag_as_deleted(&self, key: &str) -> StorageResult<()> {
        if self.should_fail(key) {
            return Err(StorageError::connection(format!("injected tag failure for {key}")));
        }
        self.inner.tag_as_deleted(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }
}

/// Every layer wired over in-memory backends.
pub struct Stack {
    /// Relational rows.
    pub rows: MemoryBackend,
    /// Raw cache entries.
    pub cache_backend: MemoryBackend,
    pub fetch_cache: FetchCache<MemoryBackend>,
    pub failing: Arc<FailingCache>,
    pub recording: Arc<RecordingCache>,
    pub repos: Repos<MemoryBackend>,
    pub cache: EntityCache<MemoryBackend>,
    pub tx: TxManager<MemoryBackend>,
    pub conversations: ConversationDatabase<MemoryBackend>,
    pub friends: FriendDatabase<MemoryBackend>,
    pub groups: GroupDatabase<MemoryBackend>,
    pub users: UserDatabase<MemoryBackend>,
    pub extend_msgs: ExtendMsgDatabase<MemoryBackend>,
}

impl Stack {
    /// A stack with a short lock poll interval.
    pub fn new() -> Self {
        let cache = CacheConfig::builder()
            .lock_sleep(Duration::from_millis(5))
            .build()
            .expect("valid cache config");
        Self::with_config(ServiceConfig::builder().cache(cache).build().expect("valid config"))
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let rows = MemoryBackend::new();
        let cache_backend = MemoryBackend::new();
        let fetch_cache = FetchCache::new(cache_backend.clone(), config.cache().clone());
        let failing = Arc::new(FailingCache::new(Arc::new(fetch_cache.clone())));
        let recording = Arc::new(RecordingCache::new(Arc::clone(&failing) as Arc<dyn CacheStore>));

        let repos = Repos::new(rows.clone());
        let cache = EntityCache::new(
            Arc::clone(&recording) as Arc<dyn CacheStore>,
            repos.clone(),
            &config,
        );
        let tx = TxManager::new(rows.clone());

        Self {
            conversations: ConversationDatabase::new(
                repos.conversations.clone(),
                cache.clone(),
                tx.clone(),
            ),
            friends: FriendDatabase::new(
                repos.friends.clone(),
                repos.blacks.clone(),
                cache.clone(),
                tx.clone(),
            ),
            groups: GroupDatabase::new(repos.groups.clone(), cache.clone(), tx.clone()),
            users: UserDatabase::new(repos.users.clone(), cache.clone(), tx.clone()),
            extend_msgs: ExtendMsgDatabase::new(repos.extend_msgs.clone(), cache.clone(), tx.clone()),
            rows,
            cache_backend,
            fetch_cache,
            failing,
            recording,
            repos,
            cache,
            tx,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new("test")
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
