// Projection Builder - derives a post's denormalized view from its fact rows

use std::sync::Arc;

use crate::core::{PostCounts, PostId, ReplySnapshot};
use crate::error::FeedResult;
use crate::infrastructure::database::{FactStore, StoreTransaction};

#[derive(Clone)]
pub struct ProjectionBuilder {
    store: Arc<dyn FactStore>,
}

impl ProjectionBuilder {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }

    /// Encoded reply snapshot for the replies visible inside `tx`
    pub async fn build_reply_snapshot_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<String> {
        let replies = self.store.list_replies_tx(tx, post_id).await?;
        ReplySnapshot::from_replies(&replies).encode()
    }

    pub async fn build_like_count_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64> {
        self.store.count_likes_tx(tx, post_id).await
    }

    pub async fn build_repost_count_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<u64> {
        self.store.count_reposts_tx(tx, post_id).await
    }

    pub async fn build_counts_tx(
        &self,
        tx: &mut StoreTransaction,
        post_id: PostId,
    ) -> FeedResult<PostCounts> {
        Ok(PostCounts {
            likes: self.build_like_count_tx(tx, post_id).await?,
            reposts: self.build_repost_count_tx(tx, post_id).await?,
        })
    }

    /// Reply snapshot derived from committed replies, used when reads cannot trust the stored copy
    pub async fn build_reply_snapshot(&self, post_id: PostId) -> FeedResult<ReplySnapshot> {
        let replies = self.store.list_replies(post_id).await?;
        Ok(ReplySnapshot::from_replies(&replies))
    }

    pub async fn build_counts(&self, post_id: PostId) -> FeedResult<PostCounts> {
        Ok(PostCounts {
            likes: self.store.count_likes(post_id).await?,
            reposts: self.store.count_reposts(post_id).await?,
        })
    }
}
