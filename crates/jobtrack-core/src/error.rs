//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before reaching storage.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The addressed record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A user-facing insert or update collided with an existing record.
    #[error("Duplicate {0}")]
    Duplicate(String),
}

impl Error {
    /// Maps a uniqueness violation to [`Error::Duplicate`], anything else to
    /// [`Error::Database`].
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            return Self::Duplicate(what.to_string());
        }
        Self::Database(err)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
