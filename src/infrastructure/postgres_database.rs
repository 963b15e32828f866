use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::core::{
    Like, LikeId, PostId, PostRow, Reply, ReplyId, Repost, RepostId, Timestamp, User, UserId,
    EMPTY_SNAPSHOT,
};
use crate::error::{FeedError, FeedResult};
use crate::infrastructure::database::{
    FactStore, ProjectionUpdate, StoreTransaction, UserDirectory,
};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        author_id VARCHAR(64) NOT NULL,
        body TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        like_count BIGINT NOT NULL DEFAULT 0 CHECK (like_count >= 0),
        repost_count BIGINT NOT NULL DEFAULT 0 CHECK (repost_count >= 0),
        reply_snapshot TEXT NOT NULL DEFAULT '[]',
        version BIGINT NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS replies (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES posts(id),
        author_id VARCHAR(64) NOT NULL,
        body TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES posts(id),
        author_id VARCHAR(64) NOT NULL,
        created_at BIGINT NOT NULL,
        UNIQUE (post_id, author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reposts (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES posts(id),
        author_id VARCHAR(64) NOT NULL,
        created_at BIGINT NOT NULL,
        UNIQUE (post_id, author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(64) PRIMARY KEY,
        display_name TEXT NOT NULL,
        favorite_team VARCHAR(64),
        updated_at BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_replies_post ON replies(post_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC)",
];

const POST_COLUMNS: &str =
    "id, author_id, body, created_at, like_count, repost_count, reply_snapshot, version";

/// PostgreSQL implementation of the fact store
pub struct PostgresFactStore {
    pool: PgPool,
}

impl PostgresFactStore {
    pub async fn connect(url: &str, max_connections: u32) -> FeedResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| FeedError::from_read("Failed to connect to PostgreSQL", e))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub async fn initialize(&self) -> FeedResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| FeedError::from_write("Failed to apply schema", e))?;
        }
        Ok(())
    }
}

fn decode_column(e: sqlx::Error) -> FeedError {
    FeedError::from_read("Failed to decode row", e)
}

fn post_from_row(row: &PgRow) -> FeedResult<PostRow> {
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

fn reply_from_row(row: &PgRow) -> FeedResult<Reply> {
    Ok(Reply {
        id: ReplyId::new(row.try_get("id").map_err(decode_column)?),
        post_id: PostId::new(row.try_get("post_id").map_err(decode_column)?),
        author_id: UserId::from_stored(row.try_get("author_id").map_err(decode_column)?),
        body: row.try_get("body").map_err(decode_column)?,
        created_at: Timestamp::from(row.try_get::<i64, _>("created_at").map_err(decode_column)?),
    })
}

fn user_from_row(row: &PgRow) -> FeedResult<User> {
    Ok(User {
        id: UserId::from_stored(row.try_get("id").map_err(decode_column)?),
        display_name: row.try_get("display_name").map_err(decode_column)?,
        favorite_team: row.try_get("favorite_team").map_err(decode_column)?,
    })
}

#[async_trait]
impl FactStore for PostgresFactStore {
    async fn begin(&self) -> FeedResult<StoreTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FeedError::from_read("Failed to begin transaction", e))?;
        Ok(StoreTransaction::new_postgres(tx))
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
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query(&format!(
            "INSERT INTO posts \
             (author_id, body, created_at, like_count, repost_count, reply_snapshot, version) \
             VALUES ($1, $2, $3, 0, 0, $4, 1) RETURNING {}",
            POST_COLUMNS
        ))
        .bind(author.as_str())
        .bind(body)
        .bind(now.value())
        .bind(EMPTY_SNAPSHOT)
        .fetch_one(&mut **pg_tx)
        .await
        .map_err(|e| FeedError::from_write("Failed to create post", e))?;

        post_from_row(&row)
    }

    async fn lock_post_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<()> {
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id.value())
            .fetch_optional(&mut **pg_tx)
            .await
            .map_err(|e| FeedError::from_write(&format!("Failed to lock post {}", post_id), e))?;

        if row.is_none() {
            return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
        }
        Ok(())
    }

    async fn get_post_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<Option<PostRow>> {
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(post_id.value())
            .fetch_optional(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query(
            "INSERT INTO replies (post_id, author_id, body, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, post_id, author_id, body, created_at",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(body)
        .bind(now.value())
        .fetch_one(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query(
            "INSERT INTO likes (post_id, author_id, created_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(now.value())
        .fetch_one(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;

        let row = sqlx::query(
            "INSERT INTO reposts (post_id, author_id, created_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(post_id.value())
        .bind(author.as_str())
        .bind(now.value())
        .fetch_one(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;

        let rows = sqlx::query(
            "SELECT id, post_id, author_id, body, created_at FROM replies \
             WHERE post_id = $1 ORDER BY id ASC",
        )
        .bind(post_id.value())
        .fetch_all(&mut **pg_tx)
        .await
        .map_err(|e| FeedError::from_write("Failed to list replies in transaction", e))?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn count_likes_tx(&self, tx: &mut StoreTransaction, post_id: PostId) -> FeedResult<u64> {
        let pg_tx = tx.as_postgres_mut()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id.value())
            .fetch_one(&mut **pg_tx)
            .await
            .map_err(|e| FeedError::from_write("Failed to count likes in transaction", e))?;
        Ok(count as u64)
    }

    async fn count_reposts_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64> {
        let pg_tx = tx.as_postgres_mut()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reposts WHERE post_id = $1")
            .bind(post_id.value())
            .fetch_one(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;

        let result = sqlx::query(
            "UPDATE posts SET like_count = COALESCE($1, like_count), \
             repost_count = COALESCE($2, repost_count), \
             reply_snapshot = COALESCE($3, reply_snapshot), version = version + 1 WHERE id = $4",
        )
        .bind(update.like_count.map(|c| c as i64))
        .bind(update.repost_count.map(|c| c as i64))
        .bind(update.reply_snapshot)
        .bind(post_id.value())
        .execute(&mut **pg_tx)
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
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(post_id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeedError::from_read(&format!("Failed to get post {}", post_id), e))?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self, limit: u32) -> FeedResult<Vec<PostRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC LIMIT $1",
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
             WHERE post_id = $1 ORDER BY id ASC",
        )
        .bind(post_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FeedError::from_read("Failed to list replies", e))?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn count_likes(&self, post_id: PostId) -> FeedResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FeedError::from_read("Failed to count likes", e))?;
        Ok(count as u64)
    }

    async fn count_reposts(&self, post_id: PostId) -> FeedResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reposts WHERE post_id = $1")
            .bind(post_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FeedError::from_read("Failed to count reposts", e))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl UserDirectory for PostgresFactStore {
    async fn upsert_user(&self, id: &UserId, display_name: &str) -> FeedResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (id, display_name, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name, \
             updated_at = EXCLUDED.updated_at \
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
            "UPDATE users SET favorite_team = $1, updated_at = $2 WHERE id = $3 \
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
        let row = sqlx::query("SELECT id, display_name, favorite_team FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeedError::from_read(&format!("Failed to get user {}", id), e))?;

        row.as_ref().map(user_from_row).transpose()
    }
}
