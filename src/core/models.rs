// Feed data model - facts (posts, replies, likes, reposts) and the externally owned user record

use serde::{Deserialize, Serialize};

use crate::core::snapshot::ReplySnapshot;
use crate::core::strong_types::{LikeId, PostId, ReplyId, RepostId, Timestamp, UserId};

/// Post as stored, with the snapshot column still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: Timestamp,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_snapshot: String,
    pub version: i64,
}

/// Post view returned to callers with its denormalized projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: Timestamp,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_snapshot: ReplySnapshot,
    pub version: i64,
}

impl Post {
    pub fn from_parts(row: PostRow, counts: PostCounts, reply_snapshot: ReplySnapshot) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
            like_count: counts.likes,
            repost_count: counts.reposts,
            reply_snapshot,
            version: row.version,
        }
    }
}

/// Denormalized counters of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostCounts {
    pub likes: u64,
    pub reposts: u64,
}

impl PostRow {
    pub fn counts(&self) -> PostCounts {
        PostCounts {
            likes: self.like_count,
            reposts: self.repost_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: LikeId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repost {
    pub id: RepostId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub created_at: Timestamp,
}

/// User profile; read-only to the feed service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub favorite_team: Option<String>,
}

/// Outcome of rebuilding a post's projection from its facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub post_id: PostId,
    pub like_count_before: u64,
    pub like_count_after: u64,
    pub repost_count_before: u64,
    pub repost_count_after: u64,
    pub snapshot_repaired: bool,
}

impl ReconcileReport {
    pub fn repaired(&self) -> bool {
        self.snapshot_repaired
            || self.like_count_before != self.like_count_after
            || self.repost_count_before != self.repost_count_after
    }
}
