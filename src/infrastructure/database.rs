// Fact Store Interface - durable storage of posts, replies, likes, reposts and the post projection
// Every reply/like/repost write runs inside a StoreTransaction; the post row is the only contended row

use async_trait::async_trait;
use sqlx::{Postgres, Sqlite, Transaction};
use std::sync::Arc;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::{Like, PostId, PostRow, Reply, Repost, User, UserId};
use crate::error::{FeedError, FeedResult};
use crate::infrastructure::postgres_database::PostgresFactStore;
use crate::infrastructure::sqlite_database::SqliteFactStore;

/// Transaction wrapper for fact store operations
pub enum StoreTransaction {
    Sqlite(Transaction<'static, Sqlite>),
    Postgres(Transaction<'static, Postgres>),
}

impl StoreTransaction {
    pub fn new_sqlite(tx: Transaction<'static, Sqlite>) -> Self {
        StoreTransaction::Sqlite(tx)
    }

    pub fn new_postgres(tx: Transaction<'static, Postgres>) -> Self {
        StoreTransaction::Postgres(tx)
    }

    pub fn as_sqlite_mut(&mut self) -> FeedResult<&mut Transaction<'static, Sqlite>> {
        match self {
            StoreTransaction::Sqlite(tx) => Ok(tx),
            StoreTransaction::Postgres(_) => Err(FeedError::Internal(
                "Expected a SQLite transaction, found PostgreSQL".to_string(),
            )),
        }
    }

    pub fn as_postgres_mut(&mut self) -> FeedResult<&mut Transaction<'static, Postgres>> {
        match self {
            StoreTransaction::Postgres(tx) => Ok(tx),
            StoreTransaction::Sqlite(_) => Err(FeedError::Internal(
                "Expected a PostgreSQL transaction, found SQLite".to_string(),
            )),
        }
    }

    /// Commit the scope; on failure the store discards every effect of the scope
    pub async fn commit(self) -> FeedResult<()> {
        let result = match self {
            StoreTransaction::Sqlite(tx) => tx.commit().await,
            StoreTransaction::Postgres(tx) => tx.commit().await,
        };
        result.map_err(|e| FeedError::WriteFailed(format!("Failed to commit transaction: {}", e)))
    }

    pub async fn rollback(self) -> FeedResult<()> {
        let result = match self {
            StoreTransaction::Sqlite(tx) => tx.rollback().await,
            StoreTransaction::Postgres(tx) => tx.rollback().await,
        };
        result.map_err(|e| FeedError::from_write("Failed to rollback transaction", e))
    }
}

/// Projection columns to overwrite on a post row; `None` leaves the column as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionUpdate {
    pub like_count: Option<u64>,
    pub repost_count: Option<u64>,
    pub reply_snapshot: Option<String>,
}

/// Fact store trait: the source of truth for posts, replies, likes and reposts
#[async_trait]
pub trait FactStore: Send + Sync {
    // Lifecycle
    async fn begin(&self) -> FeedResult<StoreTransaction>;

    /// Commit a scope opened by `begin`
    async fn commit(&self, tx: StoreTransaction) -> FeedResult<()> {
        tx.commit().await
    }

    async fn health_check(&self) -> FeedResult<()>;
    async fn close(&self);

    /// Whether fact inserts and projection writes can share one atomic scope.
    /// Stores that cannot make that guarantee are read in recompute mode.
    fn supports_atomic_scopes(&self) -> bool {
        true
    }

    // Transactional operations - execute within an open scope
    async fn create_post_tx(
        &self,
        tx: &mut StoreTransaction,
        author: &UserId,
        body: &str,
    ) -> FeedResult<PostRow>;

    /// Take the write lock on a post row; `NotFound` if the post does not exist
    async fn lock_post_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<()>;

    async fn get_post_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Option<PostRow>>;

    async fn create_reply_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
        body: &str,
    ) -> FeedResult<Reply>;

    async fn create_like_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Like>;

    async fn create_repost_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Repost>;

    async fn list_replies_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Vec<Reply>>;

    async fn count_likes_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<u64>;
    async fn count_reposts_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64>;

    async fn write_projection_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        update: ProjectionUpdate,
    ) -> FeedResult<()>;

    // Plain reads
    async fn get_post(&self, post_id: PostId) -> FeedResult<Option<PostRow>>;
    async fn list_posts(&self, limit: u32) -> FeedResult<Vec<PostRow>>;
    /// Replies in insertion order
    async fn list_replies(&self, post_id: PostId) -> FeedResult<Vec<Reply>>;
    /// Authoritative count computed from like rows
    async fn count_likes(&self, post_id: PostId) -> FeedResult<u64>;
    async fn count_reposts(&self, post_id: PostId) -> FeedResult<u64>;
}

/// User profiles owned by the authentication collaborator
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn upsert_user(&self, id: &UserId, display_name: &str) -> FeedResult<User>;
    async fn set_favorite_team(&self, id: &UserId, team_id: &str) -> FeedResult<User>;
    async fn get_user(&self, id: &UserId) -> FeedResult<Option<User>>;
}

/// Store client created at process start and shut down explicitly
#[derive(Clone)]
pub struct StoreHandle {
    pub facts: Arc<dyn FactStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl StoreHandle {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: FactStore + UserDirectory + 'static,
    {
        Self {
            facts: store.clone(),
            users: store,
        }
    }

    pub async fn close(&self) {
        self.facts.close().await;
        info!("Fact store closed");
    }
}

/// Open the backend named by the database URL scheme and apply its schema
pub async fn open_store(config: &DatabaseConfig) -> FeedResult<StoreHandle> {
    let url = config.url.as_str();
    if url.starts_with("sqlite:") {
        let store = SqliteFactStore::connect(url, config.max_connections).await?;
        info!("Opened SQLite fact store at {}", url);
        Ok(StoreHandle::from_store(Arc::new(store)))
    } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
        let store = PostgresFactStore::connect(url, config.max_connections).await?;
        info!("Opened PostgreSQL fact store");
        Ok(StoreHandle::from_store(Arc::new(store)))
    } else {
        Err(FeedError::Validation(format!(
            "Unsupported database URL '{}': expected sqlite: or postgres:",
            url
        )))
    }
}
