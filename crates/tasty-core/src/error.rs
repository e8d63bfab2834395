//! Error types for tasty-byte.

use thiserror::Error;

/// Result type alias using tasty-byte's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tasty-byte operations.
///
/// The set is closed: the HTTP boundary maps `NotFound` to 404,
/// `InvalidInput` to 400 and everything else to 500.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A transaction could not be started
    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// The unit of work succeeded but the commit failed
    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// Rollback failed; only surfaced where no other error is being propagated
    #[error("Failed to roll back transaction: {0}")]
    Rollback(#[source] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a `NotFound` error for a recipe id.
    pub fn recipe_not_found(id: i64) -> Self {
        Error::NotFound(format!("Recipe {} not found", id))
    }

    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True when the caller supplied something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidInput(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidInput(e.to_string())
    }
}
