use thiserror::Error;

/// Errors surfaced by every `crush-store` operation.
///
/// Per the crate's error-handling policy, a `Store` error is always
/// treated as fatal for the operation that raised it — callers do not
/// retry store errors, they propagate them to the caller's own boundary
/// (the coordinator ends the turn; the UI shows a toast).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("malformed content parts: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
