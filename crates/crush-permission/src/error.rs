use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    /// The user denied the request. The coordinator must treat this as a
    /// graceful turn-end signal, never as a tool failure.
    #[error("permission denied")]
    Denied,

    /// `grant`/`grant_persistent`/`deny` was called with a request ID that
    /// is not (or no longer) pending.
    #[error("no pending permission request: {id}")]
    NotFound { id: String },
}
