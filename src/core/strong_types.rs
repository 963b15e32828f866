// Strong Types - newtypes for feed identifiers and timestamps
// Row ids are assigned by the store; user ids are opaque references owned by the auth collaborator

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FeedError, FeedResult};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identity of a post row
    PostId
);
row_id!(
    /// Identity of a reply row; ascending in insertion order
    ReplyId
);
row_id!(
    /// Identity of a like row
    LikeId
);
row_id!(
    /// Identity of a repost row
    RepostId
);

/// Creation timestamp in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

static USER_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").expect("user id pattern is a valid regex")
});

/// Reference to a user owned by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user reference, rejecting anything outside `[A-Za-z0-9_.-]{1,64}`
    pub fn new(id: &str) -> FeedResult<Self> {
        if !USER_ID_PATTERN.is_match(id) {
            return Err(FeedError::Validation(format!(
                "Invalid user id '{}': expected 1-64 characters of [A-Za-z0-9_.-]",
                id
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Wrap a value read back from the store
    pub(crate) fn from_stored(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_operations() {
        let id = PostId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i64::from(ReplyId::from(7)), 7);
    }

    #[test]
    fn test_user_id_validation() {
        assert!(UserId::new("u1").is_ok());
        assert!(UserId::new("team.lead-01_x").is_ok());
        assert!(UserId::new("").is_err());
        assert!(UserId::new("has space").is_err());
        assert!(UserId::new(&"a".repeat(65)).is_err());

        let err = UserId::new("bad/id").unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&PostId::new(9)).unwrap();
        assert_eq!(json, "9");
        let json = serde_json::to_string(&UserId::new("u2").unwrap()).unwrap();
        assert_eq!(json, "\"u2\"");
    }
}
