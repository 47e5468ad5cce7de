//! Error types for the fetch runner.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing or launching a task.
#[derive(Debug, Error)]
pub enum Error {
    /// The task could not be started at all.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that was being spawned.
        program: PathBuf,
        /// Underlying spawn failure (not found, permission denied, ...).
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling the running task failed.
    #[error("I/O error while supervising task: {0}")]
    Io(#[from] std::io::Error),

    /// A date argument was not a valid calendar date.
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },

    /// The date range ends before it starts.
    #[error("Invalid date range: {start} is after {end}")]
    InvertedRange {
        /// Range start.
        start: String,
        /// Range end.
        end: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
