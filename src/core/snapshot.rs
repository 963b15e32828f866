// Reply snapshot encoding - the denormalized reply list stored on a post row
// Encoded as a JSON list of {id, author_id, body}; no replies is "[]", never null

use serde::{Deserialize, Serialize};

use crate::core::models::Reply;
use crate::core::strong_types::{ReplyId, UserId};
use crate::error::{FeedError, FeedResult};

/// Encoding written for a post that has no replies yet
pub const EMPTY_SNAPSHOT: &str = "[]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: ReplyId,
    pub author_id: UserId,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplySnapshot(Vec<SnapshotEntry>);

impl ReplySnapshot {
    /// Build a snapshot in insertion order. Reply ids ascend with each insert,
    /// so a wall clock stepping backwards cannot reorder replies.
    pub fn from_replies(replies: &[Reply]) -> Self {
        let mut ordered: Vec<&Reply> = replies.iter().collect();
        ordered.sort_by_key(|r| r.id);
        Self(
            ordered
                .into_iter()
                .map(|r| SnapshotEntry {
                    id: r.id,
                    author_id: r.author_id.clone(),
                    body: r.body.clone(),
                })
                .collect(),
        )
    }

    pub fn encode(&self) -> FeedResult<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| FeedError::Internal(format!("Failed to encode reply snapshot: {}", e)))
    }

    pub fn decode(raw: &str) -> FeedResult<Self> {
        serde_json::from_str::<Vec<SnapshotEntry>>(raw)
            .map(Self)
            .map_err(|e| FeedError::DecodeFailed(format!("Reply snapshot is malformed: {}", e)))
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strong_types::{PostId, Timestamp};

    fn reply(id: i64, created_at: i64, author: &str, body: &str) -> Reply {
        Reply {
            id: ReplyId::new(id),
            post_id: PostId::new(1),
            author_id: UserId::new(author).unwrap(),
            body: body.to_string(),
            created_at: Timestamp::from(created_at),
        }
    }

    #[test]
    fn test_empty_snapshot_is_explicit_list() {
        let snapshot = ReplySnapshot::from_replies(&[]);
        assert_eq!(snapshot.encode().unwrap(), EMPTY_SNAPSHOT);
        assert!(ReplySnapshot::decode(EMPTY_SNAPSHOT).unwrap().is_empty());
    }

    #[test]
    fn test_ordering_follows_insertion() {
        let replies = vec![
            reply(3, 200, "u3", "third"),
            reply(2, 100, "u2", "second"),
            reply(1, 100, "u1", "first"),
        ];
        let snapshot = ReplySnapshot::from_replies(&replies);
        let bodies: Vec<&str> = snapshot.entries().iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_clock_step_back_keeps_insertion_order() {
        // Second reply stamped earlier than the first
        let replies = vec![reply(8, 5_000, "u1", "first"), reply(9, 4_000, "u2", "second")];
        let snapshot = ReplySnapshot::from_replies(&replies);
        let ids: Vec<i64> = snapshot.entries().iter().map(|e| e.id.value()).collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn test_encoding_shape() {
        let snapshot = ReplySnapshot::from_replies(&[reply(5, 1, "u2", "hi")]);
        assert_eq!(
            snapshot.encode().unwrap(),
            r#"[{"id":5,"author_id":"u2","body":"hi"}]"#
        );
    }

    #[test]
    fn test_null_and_garbage_fail_to_decode() {
        for raw in ["null", "", "{\"id\":1}", "[{\"id\":\"x\"}]"] {
            let err = ReplySnapshot::decode(raw).unwrap_err();
            assert!(matches!(err, FeedError::DecodeFailed(_)), "raw={:?}", raw);
        }
    }
}
