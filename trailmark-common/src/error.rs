//! Common error types for Trailmark

use thiserror::Error;

/// Common result type for Trailmark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Trailmark crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation on concurrent creation
    #[error("Conflict: {0}")]
    Conflict(String),

    ///Rejected state transition or duplicate registration
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Session or access token past its expiry
    #[error("Expired credential: {0}")]
    ExpiredCredential(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is a unique-constraint conflict that a caller
    /// may recover from by re-reading and updating instead of inserting.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// Classify sqlx errors so recoverable contention surfaces as
/// `Error::Conflict` rather than a generic database failure. Callers rely
/// on this to retry a lost race as a lookup-then-update. Two shapes of
/// contention are retryable:
/// - unique-constraint violations (both racers inserted the same key)
/// - SQLITE_BUSY / stale-snapshot upgrade failures (two write
///   transactions raced and the loser must re-read on a fresh snapshot)
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Error::Conflict(db_err.message().to_string());
            }
            let message = db_err.message();
            if message.contains("database is locked")
                || message.contains("database table is locked")
            {
                return Error::Conflict(message.to_string());
            }
        }
        Error::Database(err)
    }
}
