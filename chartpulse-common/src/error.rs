//! Common error types for ChartPulse

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Common result type for ChartPulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across ChartPulse crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of stored snapshot columns
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Append would break the non-decreasing `captured_at` order of an artist's history
    #[error("Out-of-order snapshot for {artist_id}: {captured_at} is before latest {latest}")]
    OutOfOrder {
        artist_id: String,
        captured_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
