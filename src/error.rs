use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Stable error kinds surfaced to callers and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    StoreUnavailable,
    WriteFailed,
    DecodeFailed,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::WriteFailed => "write_failed",
            ErrorKind::DecodeFailed => "decode_failed",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Referenced post (or user) does not exist
    NotFound(String),
    /// Duplicate like for the same (author, post)
    Conflict(String),
    /// The store could not be reached; callers may retry with backoff
    StoreUnavailable(String),
    /// A write scope was aborted and nothing was committed
    WriteFailed(String),
    /// A stored reply snapshot or row could not be parsed
    DecodeFailed(String),
    Validation(String),
    Internal(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::NotFound(_) => ErrorKind::NotFound,
            FeedError::Conflict(_) => ErrorKind::Conflict,
            FeedError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            FeedError::WriteFailed(_) => ErrorKind::WriteFailed,
            FeedError::DecodeFailed(_) => ErrorKind::DecodeFailed,
            FeedError::Validation(_) => ErrorKind::Validation,
            FeedError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FeedError::NotFound(_) => StatusCode::NOT_FOUND,
            FeedError::Conflict(_) => StatusCode::CONFLICT,
            FeedError::Validation(_) => StatusCode::BAD_REQUEST,
            FeedError::StoreUnavailable(_)
            | FeedError::WriteFailed(_)
            | FeedError::DecodeFailed(_)
            | FeedError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a sqlx error raised while writing inside a scope
    pub fn from_write(context: &str, err: sqlx::Error) -> Self {
        Self::classify(context, err, true)
    }

    /// Classify a sqlx error raised by a plain read
    pub fn from_read(context: &str, err: sqlx::Error) -> Self {
        Self::classify(context, err, false)
    }

    fn classify(context: &str, err: sqlx::Error, writing: bool) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                FeedError::Conflict(format!("{}: {}", context, db_err))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                FeedError::NotFound(format!("{}: {}", context, db_err))
            }
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => FeedError::DecodeFailed(format!("{}: {}", context, err)),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => {
                FeedError::StoreUnavailable(format!("{}: {}", context, err))
            }
            _ if writing => FeedError::WriteFailed(format!("{}: {}", context, err)),
            _ => FeedError::StoreUnavailable(format!("{}: {}", context, err)),
        }
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::NotFound(msg) => write!(f, "Not found: {}", msg),
            FeedError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            FeedError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            FeedError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            FeedError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            FeedError::Validation(msg) => write!(f, "Validation error: {}", msg),
            FeedError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            FeedError::NotFound(msg) | FeedError::Conflict(msg) | FeedError::Validation(msg) => {
                msg.clone()
            }
            other => {
                tracing::error!(kind = other.kind().as_str(), "{}", other);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FeedError::NotFound("p".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(FeedError::Conflict("l".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(FeedError::Validation("b".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            FeedError::WriteFailed("w".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            FeedError::StoreUnavailable("s".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pool_errors_are_store_unavailable() {
        let err = FeedError::from_write("begin", sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        let err = FeedError::from_read("get post", sqlx::Error::PoolClosed);
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn test_other_errors_depend_on_path() {
        let err = FeedError::from_write("insert", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::WriteFailed);

        let err = FeedError::from_read("select", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn test_column_errors_are_decode_failed() {
        let err = FeedError::from_read("post row", sqlx::Error::ColumnNotFound("like_count".into()));
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);

        let err = FeedError::from_write("post row", sqlx::Error::ColumnNotFound("id".into()));
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
    }
}
