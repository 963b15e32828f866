#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use social_feed::config::{FeedConfig, ReadMode};
use social_feed::core::{Like, PostId, PostRow, Reply, Repost, UserId};
use social_feed::infrastructure::{
    FactStore, PostgresFactStore, ProjectionUpdate, SqliteFactStore, StoreTransaction,
};
use social_feed::services::FeedService;
use social_feed::{FeedError, FeedResult};

pub fn feed_config() -> FeedConfig {
    FeedConfig {
        read_mode: ReadMode::Stored,
        write_timeout: Some(Duration::from_secs(10)),
        max_body_len: 280,
    }
}

pub async fn memory_store() -> Arc<SqliteFactStore> {
    Arc::new(SqliteFactStore::new_in_memory().await.unwrap())
}

/// File-backed store so several pooled connections share one database
pub async fn file_store(max_connections: u32) -> (TempDir, Arc<SqliteFactStore>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("feed.db").display());
    let store = SqliteFactStore::connect(&url, max_connections).await.unwrap();
    (dir, Arc::new(store))
}

/// PostgreSQL store named by `TEST_POSTGRES_URL`; `None` when the variable is unset
pub async fn postgres_store() -> Option<Arc<PostgresFactStore>> {
    let url = std::env::var("TEST_POSTGRES_URL").ok()?;
    Some(Arc::new(PostgresFactStore::connect(&url, 8).await.unwrap()))
}

pub fn feed_over(store: Arc<dyn FactStore>) -> FeedService {
    FeedService::new(store, feed_config())
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Fail the projection write after the fact row was inserted
    FailProjectionWrite,
    /// Sleep before the projection write
    StallProjectionWrite(Duration),
    /// Sleep before sending COMMIT
    StallCommit(Duration),
    /// Report that fact and projection writes cannot share a scope
    NoAtomicScopes,
}

/// Delegates to SQLite but injects a fault into the write scope
pub struct FaultyStore {
    pub inner: Arc<SqliteFactStore>,
    pub fault: Fault,
}

impl FaultyStore {
    pub fn new(inner: Arc<SqliteFactStore>, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

#[async_trait]
impl FactStore for FaultyStore {
    async fn begin(&self) -> FeedResult<StoreTransaction> {
        self.inner.begin().await
    }

    async fn commit(&self, tx: StoreTransaction) -> FeedResult<()> {
        if let Fault::StallCommit(delay) = self.fault {
            tokio::time::sleep(delay).await;
        }
        self.inner.commit(tx).await
    }

    async fn health_check(&self) -> FeedResult<()> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await
    }

    fn supports_atomic_scopes(&self) -> bool {
        !matches!(self.fault, Fault::NoAtomicScopes)
    }

    async fn create_post_tx(
        &self,
        tx: &mut StoreTransaction,
        author: &UserId,
        body: &str,
    ) -> FeedResult<PostRow> {
        self.inner.create_post_tx(tx, author, body).await
    }

    async fn lock_post_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<()> {
        self.inner.lock_post_tx(tx, post_id).await
    }

    async fn get_post_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Option<PostRow>> {
        self.inner.get_post_tx(tx, post_id).await
    }

    async fn create_reply_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
        body: &str,
    ) -> FeedResult<Reply> {
        self.inner.create_reply_tx(tx, post_id, author, body).await
    }

    async fn create_like_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Like> {
        self.inner.create_like_tx(tx, post_id, author).await
    }

    async fn create_repost_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Repost> {
        self.inner.create_repost_tx(tx, post_id, author).await
    }

    async fn list_replies_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Vec<Reply>> {
        self.inner.list_replies_tx(tx, post_id).await
    }

    async fn count_likes_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<u64> {
        self.inner.count_likes_tx(tx, post_id).await
    }

    async fn count_reposts_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64> {
        self.inner.count_reposts_tx(tx, post_id).await
    }

    async fn write_projection_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        update: ProjectionUpdate,
    ) -> FeedResult<()> {
        match self.fault {
            Fault::FailProjectionWrite => {
                return Err(FeedError::WriteFailed("injected projection failure".to_string()))
            }
            Fault::StallProjectionWrite(delay) => tokio::time::sleep(delay).await,
            Fault::StallCommit(_) | Fault::NoAtomicScopes => {}
        }
        self.inner.write_projection_tx(tx, post_id, update).await
    }

    async fn get_post(&self, post_id: PostId) -> FeedResult<Option<PostRow>> {
        self.inner.get_post(post_id).await
    }

    async fn list_posts(&self, limit: u32) -> FeedResult<Vec<PostRow>> {
        self.inner.list_posts(limit).await
    }

    async fn list_replies(&self, post_id: PostId) -> FeedResult<Vec<Reply>> {
        self.inner.list_replies(post_id).await
    }

    async fn count_likes(&self, post_id: PostId) -> FeedResult<u64> {
        self.inner.count_likes(post_id).await
    }

    async fn count_reposts(&self, post_id: PostId) -> FeedResult<u64> {
        self.inner.count_reposts(post_id).await
    }
}
