//! Common error types for BeatArena

use thiserror::Error;

/// Common result type for BeatArena operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with existing state (duplicate vote, second submission, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller is authenticated but not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Audio could not be decoded or encoded
    #[error("Audio error: {0}")]
    Audio(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a unique-constraint violation to `Conflict`, keep everything else as `Database`
    pub fn from_unique(err: sqlx::Error, message: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Conflict(message.into())
            }
            _ => Error::Database(err),
        }
    }
}
