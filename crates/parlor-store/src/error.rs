//! Store error type.

/// Errors produced by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(String),

    /// No row matched.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique key is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Username exists but the password does not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Rejected before touching the database.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure while preparing the database file.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
