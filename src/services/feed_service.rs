// Feed Service - the only writer of a post's denormalized fields
//
// Every reply/like/repost write runs as one scope: lock post row, insert fact,
// rebuild projection, write post row, commit. Any error before commit aborts the whole scope.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::{FeedConfig, ReadMode};
use crate::core::{
    Like, Post, PostId, PostRow, ReconcileReport, Reply, ReplySnapshot, Repost, UserId,
};
use crate::error::{FeedError, FeedResult};
use crate::infrastructure::database::{FactStore, ProjectionUpdate, StoreTransaction};
use crate::services::projection_builder::ProjectionBuilder;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn FactStore>,
    projections: ProjectionBuilder,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(store: Arc<dyn FactStore>, config: FeedConfig) -> Self {
        Self {
            projections: ProjectionBuilder::new(store.clone()),
            store,
            config,
        }
    }

    /// Copy of this service whose write scopes use `deadline`
    pub fn with_deadline(&self, deadline: Duration) -> Self {
        let mut service = self.clone();
        service.config.write_timeout = Some(deadline);
        service
    }

    pub fn read_mode(&self) -> ReadMode {
        if self.store.supports_atomic_scopes() {
            self.config.read_mode
        } else {
            ReadMode::Recompute
        }
    }

    #[instrument(skip(self, body))]
    pub async fn create_post(&self, author: &str, body: &str) -> FeedResult<Post> {
        let author = UserId::new(author)?;
        self.validate_body(body)?;

        let staged = self
            .with_deadline_scope("create_post", async {
                let mut tx = self.store.begin().await?;
                let result = self.store.create_post_tx(&mut tx, &author, body).await;
                stage_scope("create_post", tx, result).await
            })
            .await?;
        let row = self.commit_scope("create_post", staged).await?;

        debug!(post_id = %row.id, "post created");
        self.view_from_row(row).await
    }

    #[instrument(skip(self, body))]
    pub async fn append_reply(&self, post_id: PostId, author: &str, body: &str) -> FeedResult<Reply> {
        let author = UserId::new(author)?;
        self.validate_body(body)?;

        let staged = self
            .with_deadline_scope("append_reply", async {
                let mut tx = self.store.begin().await?;
                let result = self.append_reply_in_scope(&mut tx, post_id, &author, body).await;
                stage_scope("append_reply", tx, result).await
            })
            .await?;
        self.commit_scope("append_reply", staged).await
    }

    #[instrument(skip(self))]
    pub async fn record_like(&self, post_id: PostId, author: &str) -> FeedResult<Like> {
        let author = UserId::new(author)?;

        let staged = self
            .with_deadline_scope("record_like", async {
                let mut tx = self.store.begin().await?;
                let result = self.record_like_in_scope(&mut tx, post_id, &author).await;
                stage_scope("record_like", tx, result).await
            })
            .await?;
        self.commit_scope("record_like", staged).await
    }

    #[instrument(skip(self))]
    pub async fn record_repost(&self, post_id: PostId, author: &str) -> FeedResult<Repost> {
        let author = UserId::new(author)?;

        let staged = self
            .with_deadline_scope("record_repost", async {
                let mut tx = self.store.begin().await?;
                let result = self.record_repost_in_scope(&mut tx, post_id, &author).await;
                stage_scope("record_repost", tx, result).await
            })
            .await?;
        self.commit_scope("record_repost", staged).await
    }

    /// Current post view. In stored mode the row is returned as written; in
    /// recompute mode the projection is derived from facts on every call.
    #[instrument(skip(self))]
    pub async fn get_post(&self, post_id: PostId) -> FeedResult<Post> {
        let row = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("Post {} not found", post_id)))?;
        self.view_from_row(row).await
    }

    /// Most recent posts first
    pub async fn list_posts(&self, limit: Option<u32>) -> FeedResult<Vec<Post>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let rows = self.store.list_posts(limit).await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(self.view_from_row(row).await?);
        }
        Ok(posts)
    }

    /// Live reply facts for a post, bypassing the snapshot
    pub async fn list_replies(&self, post_id: PostId) -> FeedResult<Vec<Reply>> {
        if self.store.get_post(post_id).await?.is_none() {
            return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
        }
        self.store.list_replies(post_id).await
    }

    /// Rebuild both projections from facts and rewrite the post row if either drifted
    #[instrument(skip(self))]
    pub async fn reconcile_post(&self, post_id: PostId) -> FeedResult<ReconcileReport> {
        let staged = self
            .with_deadline_scope("reconcile_post", async {
                let mut tx = self.store.begin().await?;
                let result = self.reconcile_in_scope(&mut tx, post_id).await;
                stage_scope("reconcile_post", tx, result).await
            })
            .await?;
        let report = self.commit_scope("reconcile_post", staged).await?;

        if report.repaired() {
            warn!(
                post_id = %post_id,
                like_count_before = report.like_count_before,
                like_count_after = report.like_count_after,
                repost_count_before = report.repost_count_before,
                repost_count_after = report.repost_count_after,
                snapshot_repaired = report.snapshot_repaired,
                "post projection repaired"
            );
        }
        Ok(report)
    }

    async fn append_reply_in_scope(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
        body: &str,
    ) -> FeedResult<Reply> {
        self.store.lock_post_tx(tx, post_id).await?;
        let reply = self.store.create_reply_tx(tx, post_id, author, body).await?;
        let snapshot = self.projections.build_reply_snapshot_tx(tx, post_id).await?;
        self.store
            .write_projection_tx(
                tx,
                post_id,
                ProjectionUpdate {
                    reply_snapshot: Some(snapshot),
                    ..Default::default()
                },
            )
            .await?;
        Ok(reply)
    }

    async fn record_like_in_scope(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Like> {
        self.store.lock_post_tx(tx, post_id).await?;
        let like = self.store.create_like_tx(tx, post_id, author).await?;
        let like_count = self.projections.build_like_count_tx(tx, post_id).await?;
        self.store
            .write_projection_tx(
                tx,
                post_id,
                ProjectionUpdate {
                    like_count: Some(like_count),
                    ..Default::default()
                },
            )
            .await?;
        Ok(like)
    }

    async fn record_repost_in_scope(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
        author: &UserId,
    ) -> FeedResult<Repost> {
        self.store.lock_post_tx(tx, post_id).await?;
        let repost = self.store.create_repost_tx(tx, post_id, author).await?;
        let repost_count = self.projections.build_repost_count_tx(tx, post_id).await?;
        self.store
            .write_projection_tx(
                tx,
                post_id,
                ProjectionUpdate {
                    repost_count: Some(repost_count),
                    ..Default::default()
                },
            )
            .await?;
        Ok(repost)
    }

    async fn reconcile_in_scope(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<ReconcileReport> {
        self.store.lock_post_tx(tx, post_id).await?;
        let row = self
            .store
            .get_post_tx(tx, post_id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("Post {} not found", post_id)))?;

        let snapshot = self.projections.build_reply_snapshot_tx(tx, post_id).await?;
        let counts = self.projections.build_counts_tx(tx, post_id).await?;

        // A stored snapshot that no longer decodes counts as drift
        let snapshot_repaired = match ReplySnapshot::decode(&row.reply_snapshot) {
            Ok(stored) => stored.encode()? != snapshot,
            Err(_) => true,
        };
        let report = ReconcileReport {
            post_id,
            like_count_before: row.like_count,
            like_count_after: counts.likes,
            repost_count_before: row.repost_count,
            repost_count_after: counts.reposts,
            snapshot_repaired,
        };

        if report.repaired() {
            self.store
                .write_projection_tx(
                    tx,
                    post_id,
                    ProjectionUpdate {
                        like_count: Some(counts.likes),
                        repost_count: Some(counts.reposts),
                        reply_snapshot: Some(snapshot),
                    },
                )
                .await?;
        }
        Ok(report)
    }

    async fn view_from_row(&self, row: PostRow) -> FeedResult<Post> {
        match self.read_mode() {
            ReadMode::Stored => {
                let snapshot = ReplySnapshot::decode(&row.reply_snapshot)?;
                let counts = row.counts();
                Ok(Post::from_parts(row, counts, snapshot))
            }
            ReadMode::Recompute => {
                let snapshot = self.projections.build_reply_snapshot(row.id).await?;
                let counts = self.projections.build_counts(row.id).await?;
                Ok(Post::from_parts(row, counts, snapshot))
            }
        }
    }

    fn validate_body(&self, body: &str) -> FeedResult<()> {
        if body.trim().is_empty() {
            return Err(FeedError::Validation("Body must not be empty".to_string()));
        }
        let len = body.chars().count();
        if len > self.config.max_body_len {
            return Err(FeedError::Validation(format!(
                "Body is {} characters; the limit is {}",
                len, self.config.max_body_len
            )));
        }
        Ok(())
    }

    /// Run the staging part of a write scope under the configured deadline.
    /// On expiry the scope future is dropped, which rolls its transaction back.
    /// The commit is not covered: once COMMIT is sent the outcome belongs to the store.
    async fn with_deadline_scope<T, F>(&self, operation: &'static str, scope: F) -> FeedResult<T>
    where
        F: Future<Output = FeedResult<T>>,
    {
        match self.config.write_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, scope).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(operation, ?deadline, "write scope exceeded its deadline");
                    Err(FeedError::WriteFailed(format!(
                        "{} exceeded its deadline of {:?}",
                        operation, deadline
                    )))
                }
            },
            None => scope.await,
        }
    }

    async fn commit_scope<T>(
        &self,
        operation: &'static str,
        (tx, value): (StoreTransaction, T),
    ) -> FeedResult<T> {
        self.store.commit(tx).await?;
        debug!(operation, "write scope committed");
        Ok(value)
    }
}

/// Keep the open scope for commit on success; otherwise roll back and
/// surface the first error unchanged
async fn stage_scope<T>(
    operation: &'static str,
    tx: StoreTransaction,
    result: FeedResult<T>,
) -> FeedResult<(StoreTransaction, T)> {
    match result {
        Ok(value) => Ok((tx, value)),
        Err(err) => {
            warn!(operation, kind = err.kind().as_str(), error = %err, "aborting write scope");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "rollback failed; store discards the scope on disconnect");
            }
            Err(err)
        }
    }
}
