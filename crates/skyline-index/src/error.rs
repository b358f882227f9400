//! Error types for the index crate.

use rusqlite::ErrorCode;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The database is busy or locked by another connection. Worth retrying.
    #[error("storage busy: {0}")]
    Busy(rusqlite::Error),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored cursor or row could not be interpreted.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A thread panicked while holding the connection.
    #[error("index connection lock poisoned")]
    Poisoned,

    /// Transient failures persisted past the retry budget.
    #[error("write failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<IndexError>,
    },
}

impl IndexError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy(err),
            _ => Self::Storage(err),
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
