// Core types - identifiers, facts and the reply snapshot encoding

pub mod models;
pub mod snapshot;
pub mod strong_types;

pub use models::{Like, Post, PostCounts, PostRow, ReconcileReport, Reply, Repost, User};
pub use snapshot::{ReplySnapshot, SnapshotEntry, EMPTY_SNAPSHOT};
pub use strong_types::{LikeId, PostId, ReplyId, RepostId, Timestamp, UserId};
