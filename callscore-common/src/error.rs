//! Common error types for callscore

use thiserror::Error;

/// Common result type for callscore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across callscore crates
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

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying storage reported a column that does not exist.
    ///
    /// Readers that must keep working against an older schema use this to
    /// fall back instead of failing the request.
    pub fn is_missing_column(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                let msg = db_err.message().to_lowercase();
                msg.contains("no such column") || msg.contains("has no column named")
            }
            Error::Database(sqlx::Error::ColumnNotFound(_)) => true,
            _ => false,
        }
    }
}
