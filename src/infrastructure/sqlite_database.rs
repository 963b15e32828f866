use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core::{
    Like, LikeId, PostId, PostRow, Reply, ReplyId, Repost, RepostId, Timestamp, User, UserId,
    EMPTY_SNAPSHOT,
};
use crate::error::{FeedError, FeedResult};
use crate::infrastructure::database::{
    FactStore, ProjectionUpdate, StoreTransaction, UserDirectory,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
        repost_count INTEGER NOT NULL DEFAULT 0 CHECK (repost_count >= 0),
        reply_snapshot TEXT NOT NULL DEFAULT '[]',
        version INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS replies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id),
        author_id TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id),
        author_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (post_id, author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reposts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id),
        author_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (post_id, author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        favorite_team TEXT,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_replies_post ON replies(post_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC)",
];

const POST_COLUMNS: &str =
    "id, author_id, body, created_at, like_count, repost_count, reply_snapshot, version";

/// SQLite implementation of the fact store
pub struct SqliteFactStore {
    pool: SqlitePool,
}

impl SqliteFactStore {
    /// Connect to a SQLite URL. File databases run in WAL mode; in-memory
    /// databases keep a single connection alive for the life of the pool.
    pub async fn connect(url: &str, max_connections: u32) -> FeedResult<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        if !in_memory {
            ensure_parent_dir(url)?;
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| FeedError::Validation(format!("Invalid SQLite URL '{}': {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let connected = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                )
                .await
        };
        let pool = connected
            .map_err(|e| FeedError::from_read(&format!("Failed to connect to {}", url), e))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub async fn new_in_memory() -> FeedResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create feed tables and indexes if they are missing
    pub async fn initialize(&self) -> FeedResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| FeedError::from_write("Failed to apply schema", e))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn ensure_parent_dir(url: &str) -> FeedResult<()> {
    let path = url
        .trim_start_matches("sqlite:")
        .trim_start_matches("//")
        .split('?')
        .next()
        .unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FeedError::StoreUnavailable(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

fn decode_column(e: sqlx::Error) -> FeedError {
    FeedError::from_read("Failed to decode row", e)
}

fn post_from_row(row: &SqliteRow) -> FeedResult<PostRow> {
    Ok(PostRow {
        id: PostId::new(row.try_get("id").map_err(decode_column)?),
        author_id: UserId::from_stored(row.try_get("author_id").map_err(decode_column)?),
        body: row.try_get("body").map_err(decode_column)?,
        created_at: Timestamp::from(row.try_get::<i64, _>("created_at").map_err(decode_column)?),
        like_count: row.try_get::<i64, _>("like_count").map_err(decode_column)? as u64,
        repost_count: row.try_get::<i64, _>("repost_count").map_err(decode_column)? as u64,
        reply_snapshot: row.try_get("reply_snapshot").map_err(decode_column)?,
        version: row.try_get("version").map_err(decode_column)?,
    })
}

fn reply_from_row(row: &SqliteRow) -> FeedResult<Reply> {
    Ok(Reply {
        id: ReplyId::new(row.try_get("id").map_err(decode_column)?),
        post_id: PostId::new(row.try_get("post_id").map_err(decode_column)?),
        author_id: UserId::from_stored(row.try_get("author_id").map_err(decode_column)?),
        body: row.try_get("body").map_err(decode_column)?,
        created_at: Timestamp::from(row.try_get::<i64, _>("created_at").map_err(decode_column)?),
    })
}

fn user_from_row(row: &SqliteRow) -> FeedResult<User> {
    Ok(User {
        id: UserId::from_stored(row.try_get("id").map_err(decode_column)?),
        display_name: row.try_get("display_name").map_err(decode_column)?,
        favorite_team: row.try_get("favorite_team").map_err(decode_column)?,
    })
}

#[async_trait]
impl FactStore for SqliteFactStore {
    async fn begin(&self) -> FeedResult<StoreTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FeedError::from_read("Failed to begin transaction", e))?;
        Ok(StoreTransaction::new_sqlite(tx))
    }

    async fn health_check(&self) -> FeedResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| FeedError::from_read("Database health check failed", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn create_post_tx(
        &self,
        tx: &mut StoreTransaction,
        author: &UserId,
        body: &str,
    ) -> FeedResult<PostRow> {
        let now = Timestamp::now();
        let sqlite_tx = tx.as_sqlite_mut()?;

        let row = sqlx::query(&format!(
            "INSERT INTO posts \
             (author_id, body, created_at, like_count, repost_count, reply_snapshot, version) \
             VALUES (?, ?, ?, 0, 0, ?, 1) RETURNING {}",
            POST_COLUMNS
        ))
        .bind(author.as_str())
        .bind(body)
        .bind(now.value())
        .bind(EMPTY_SNAPSHOT)
        .fetch_one(&mut **sqlite_tx)
        .await
        .map_err(|e| FeedError::from_write("Failed to create post", e))?;

        post_from_row(&row)
    }

    async fn lock_post_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        // A no-op write takes the database write lock before any fact is read or inserted
        let result = sqlx::query("UPDATE posts SET version = version WHERE id = ?")
            .bind(post_id.value())
            .execute(&mut **sqlite_tx)
            .await
            .map_err(|e| FeedError::from_write(&format!("Failed to lock post {}", post_id), e))?;

        if result.rows_affected() == 0 {
            return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
        }
        Ok(())
    }

    async fn get_post_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Option<PostRow>> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(post_id.value())
            .fetch_optional(&mut **sqlite_tx)
            .await
            .map_err(|e| FeedError::from_write(&format!("Failed to get post {}", post_id), e))?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn create_reply_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
        body: &str,
    ) -> FeedResult<Reply> {
        let now = Timestamp::now();
        let sqlite_tx = tx.as_sqlite_mut()?;

        let row = sqlx::query(
            "INSERT INTO replies (post_id, author_id, body, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, post_id, author_id, body, created_at",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(body)
        .bind(now.value())
        .fetch_one(&mut **sqlite_tx)
        .await
        .map_err(|e| match FeedError::from_write("Failed to create reply", e) {
            FeedError::NotFound(_) => FeedError::NotFound(format!("Post {} not found", post_id)),
            other => other,
        })?;

        reply_from_row(&row)
    }

    async fn create_like_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Like> {
        let now = Timestamp::now();
        let sqlite_tx = tx.as_sqlite_mut()?;

        let row = sqlx::query(
            "INSERT INTO likes (post_id, author_id, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(now.value())
        .fetch_one(&mut **sqlite_tx)
        .await
        .map_err(|e| match FeedError::from_write("Failed to create like", e) {
            FeedError::NotFound(_) => FeedError::NotFound(format!("Post {} not found", post_id)),
            FeedError::Conflict(_) => FeedError::Conflict(format!(
                "User {} already liked post {}",
                author, post_id
            )),
            other => other,
        })?;

        Ok(Like {
            id: LikeId::new(row.try_get("id").map_err(decode_column)?),
            post_id,
            author_id: author.clone(),
            created_at: now,
        })
    }

    async fn create_repost_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Repost> {
        let now = Timestamp::now();
        let sqlite_tx = tx.as_sqlite_mut()?;

        let row = sqlx::query(
            "INSERT INTO reposts (post_id, author_id, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(now.value())
        .fetch_one(&mut **sqlite_tx)
        .await
        .map_err(|e| match FeedError::from_write("Failed to create repost", e) {
            FeedError::NotFound(_) => FeedError::NotFound(format!("Post {} not found", post_id)),
            FeedError::Conflict(_) => FeedError::Conflict(format!(
                "User {} already reposted post {}",
                author, post_id
            )),
            other => other,
        })?;

        Ok(Repost {
            id: RepostId::new(row.try_get("id").map_err(decode_column)?),
            post_id,
            author_id: author.clone(),
            created_at: now,
        })
    }

    async fn list_replies_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Vec<Reply>> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        let rows = sqlx::query(
            "SELECT id, post_id, author_id, body, created_at FROM replies \
             WHERE post_id = ? ORDER BY id ASC",
        )
        .bind(post_id.value())
        .fetch_all(&mut **sqlite_tx)
        .await
        .map_err(|e| FeedError::from_write("Failed to list replies in transaction", e))?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn count_likes_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<u64> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id.value())
            .fetch_one(&mut **sqlite_tx)
            .await
            .map_err(|e| FeedError::from_write("Failed to count likes in transaction", e))?;
        Ok(count as u64)
    }

    async fn count_reposts_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reposts WHERE post_id = ?")
            .bind(post_id.value())
            .fetch_one(&mut **sqlite_tx)
            .await
            .map_err(|e| FeedError::from_write("Failed to count reposts in transaction", e))?;
        Ok(count as u64)
    }

    async fn write_projection_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        update: ProjectionUpdate,
    ) -> FeedResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;

        let result = sqlx::query(
            "UPDATE posts SET like_count = COALESCE(?, like_count), \
             repost_count = COALESCE(?, repost_count), \
             reply_snapshot = COALESCE(?, reply_snapshot), version = version + 1 WHERE id = ?",
        )
        .bind(update.like_count.map(|c| c as i64))
        .bind(update.repost_count.map(|c| c as i64))
        .bind(update.reply_snapshot)
        .bind(post_id.value())
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| {
            FeedError::from_write(&format!("Failed to write projection for post {}", post_id), e)
        })?;

        if result.rows_affected() == 0 {
            return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
        }
        Ok(())
    }

    async fn get_post(&self, post_id: PostId) -> FeedResult<Option<PostRow>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(post_id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeedError::from_read(&format!("Failed to get post {}", post_id), e))?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self, limit: u32) -> FeedResult<Vec<PostRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC LIMIT ?",
            POST_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FeedError::from_read("Failed to list posts", e))?;

        rows.iter().map(post_from_row).collect()
    }

    async fn list_replies(&self, post_id: PostId) -> FeedResult<Vec<Reply>> {
        let rows = sqlx::query(
            "SELECT id, post_id, author_id, body, created_at FROM replies \
             WHERE post_id = ? ORDER BY id ASC",
        )
        .bind(post_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FeedError::from_read("Failed to list replies", e))?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn count_likes(&self, post_id: PostId) -> FeedResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FeedError::from_read("Failed to count likes", e))?;
        Ok(count as u64)
    }

    async fn count_reposts(&self, post_id: PostId) -> FeedResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reposts WHERE post_id = ?")
            .bind(post_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FeedError::from_read("Failed to count reposts", e))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl UserDirectory for SqliteFactStore {
    async fn upsert_user(&self, id: &UserId, display_name: &str) -> FeedResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (id, display_name, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, \
             updated_at = excluded.updated_at \
             RETURNING id, display_name, favorite_team",
        )
        .bind(id.as_str())
        .bind(display_name)
        .bind(Timestamp::now().value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| FeedError::from_write(&format!("Failed to upsert user {}", id), e))?;

        user_from_row(&row)
    }

    async fn set_favorite_team(&self, id: &UserId, team_id: &str) -> FeedResult<User> {
        let row = sqlx::query(
            "UPDATE users SET favorite_team = ?, updated_at = ? WHERE id = ? \
             RETURNING id, display_name, favorite_team",
        )
        .bind(team_id)
        .bind(Timestamp::now().value())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FeedError::from_write(&format!("Failed to update user {}", id), e))?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(FeedError::NotFound(format!("User {} not found", id))),
        }
    }

    async fn get_user(&self, id: &UserId) -> FeedResult<Option<User>> {
        let row = sqlx::query("SELECT id, display_name, favorite_team FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeedError::from_read(&format!("Failed to get user {}", id), e))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn post_in_scope(store: &SqliteFactStore, author: &str, body: &str) -> PostRow {
        let mut tx = store.begin().await.unwrap();
        let post = store.create_post_tx(&mut tx, &user(author), body).await.unwrap();
        tx.commit().await.unwrap();
        post
    }

    #[tokio::test]
    async fn test_create_post_starts_with_empty_projection() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        assert_eq!(post.like_count, 0);
        assert_eq!(post.repost_count, 0);
        assert_eq!(post.reply_snapshot, EMPTY_SNAPSHOT);
        assert_eq!(post.version, 1);

        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched, post);
    }

    #[tokio::test]
    async fn test_reply_requires_parent_post() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let err = store
            .create_reply_tx(&mut tx, PostId::new(999), &user("u2"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)), "got {:?}", err);
        tx.rollback().await.unwrap();

        assert!(store.list_replies(PostId::new(999)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_missing_post_is_not_found() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let err = store.lock_post_tx(&mut tx, PostId::new(5)).await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_like_conflicts() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        let mut tx = store.begin().await.unwrap();
        store.create_like_tx(&mut tx, post.id, &user("u4")).await.unwrap();
        let err = store.create_like_tx(&mut tx, post.id, &user("u4")).await.unwrap_err();
        assert!(matches!(err, FeedError::Conflict(_)), "got {:?}", err);
        tx.commit().await.unwrap();

        assert_eq!(store.count_likes(post.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replies_listed_in_insertion_order() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        let mut tx = store.begin().await.unwrap();
        for (author, body) in [("u2", "first"), ("u3", "second"), ("u2", "third")] {
            store.create_reply_tx(&mut tx, post.id, &user(author), body).await.unwrap();
        }
        tx.commit().await.unwrap();

        let bodies: Vec<String> = store
            .list_replies(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_projection_write_bumps_version_and_keeps_untouched_column() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        let mut tx = store.begin().await.unwrap();
        store
            .write_projection_tx(
                &mut tx,
                post.id,
                ProjectionUpdate {
                    like_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.like_count, 3);
        assert_eq!(fetched.repost_count, 0);
        assert_eq!(fetched.reply_snapshot, EMPTY_SNAPSHOT);
        assert_eq!(fetched.version, 2);
    }

    #[tokio::test]
    async fn test_rollback_discards_facts() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        let mut tx = store.begin().await.unwrap();
        store.create_like_tx(&mut tx, post.id, &user("u4")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count_likes(post.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_user_directory() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let id = user("fan_1");

        let err = store.set_favorite_team(&id, "tigers").await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));

        store.upsert_user(&id, "Fan One").await.unwrap();
        let updated = store.set_favorite_team(&id, "tigers").await.unwrap();
        assert_eq!(updated.favorite_team.as_deref(), Some("tigers"));

        let renamed = store.upsert_user(&id, "Fan #1").await.unwrap();
        assert_eq!(renamed.display_name, "Fan #1");
        assert_eq!(renamed.favorite_team.as_deref(), Some("tigers"));

        assert!(store.get_user(&user("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_repost_conflicts() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let post = post_in_scope(&store, "u1", "hello").await;

        let mut tx = store.begin().await.unwrap();
        store.create_repost_tx(&mut tx, post.id, &user("u5")).await.unwrap();
        let err = store.create_repost_tx(&mut tx, post.id, &user("u5")).await.unwrap_err();
        assert!(matches!(err, FeedError::Conflict(_)), "got {:?}", err);
        store.create_like_tx(&mut tx, post.id, &user("u5")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.count_reposts(post.id).await.unwrap(), 1);
        assert_eq!(store.count_likes(post.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repost_requires_parent_post() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let err = store
            .create_repost_tx(&mut tx, PostId::new(404), &user("u5"))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_mismatched_row_is_decode_failed() {
        let store = SqliteFactStore::new_in_memory().await.unwrap();
        let row = sqlx::query("SELECT 1 AS id, 'u1' AS author_id")
            .fetch_one(store.pool())
            .await
            .unwrap();

        let err = post_from_row(&row).unwrap_err();
        assert!(matches!(err, FeedError::DecodeFailed(_)), "got {:?}", err);
        let err = user_from_row(&row).unwrap_err();
        assert!(matches!(err, FeedError::DecodeFailed(_)), "got {:?}", err);
    }
}
