use thiserror::Error;

use super::events::StreamType;

/// Stable error classification for every command and query.
///
/// `NotFound` and `InvalidOperation` are raised before any event is appended.
/// `Conflict` propagates from the store's version-uniqueness check; events
/// already appended earlier within the same multi-event command are not
/// rolled back. `Storage` and `Decode` are fatal and never retried here.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("version conflict on {stream_type} stream {stream_id} at version {version}")]
    Conflict {
        stream_type: StreamType,
        stream_id: String,
        version: i64,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("event decode failed: {0}")]
    Decode(String),
}

impl BoardError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BoardError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::Decode(err.to_string())
    }
}
