//! Error types for Lockbox.

use thiserror::Error;

/// Common error type for Lockbox.
#[derive(Error, Debug)]
pub enum LockboxError {
    /// Database error.
    ///
    /// A query reached the store and failed there.
    #[error("database error: {0}")]
    Database(String),

    /// The store could not be reached (pool timeout, closed pool, broken connection).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing or verification failed for a reason other than a mismatch.
    #[error("credential error: {0}")]
    Credential(#[from] crate::auth::PasswordError),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for LockboxError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                LockboxError::StoreUnavailable(e.to_string())
            }
            other => LockboxError::Database(other.to_string()),
        }
    }
}

/// Result type alias for Lockbox operations.
pub type Result<T> = std::result::Result<T, LockboxError>;
