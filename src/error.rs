use std::time::Duration;
use thiserror::Error;

/// Failures of the session persistence port
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Auth: {0}")]
    Auth(String),

    #[error("Parse: {0}")]
    Parse(String),

    #[error("DB: {0}")]
    Db(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Db(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Parse(e.to_string())
        } else {
            StoreError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Elapsed time is kept; the caller may retry the stop.
    #[error("Failed to stop session {session_id}: {source}")]
    StopFailed {
        session_id: String,
        source: StoreError,
    },

    #[error("Store: {0}")]
    Store(#[from] StoreError),

    #[error("Internal: {0}")]
    Internal(String),
}
