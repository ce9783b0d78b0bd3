//! Error types for the jukebox coordination core

use thiserror::Error;

/// Core error type for storage and coordination operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Database errors (pool, connectivity, query execution).
    /// Never retried by this layer; they propagate to the caller.
    #[error("database error: {0}")]
    Database(String),

    /// Song row codec failures
    #[error("song encoding error: {0}")]
    Encoding(String),

    /// Malformed stored values (timestamps, row shapes)
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration loading failures
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Application-level handler failures
    #[error("handler error: {0}")]
    Handler(String),
}

impl Error {
    /// Create a database error from any displayable source.
    pub fn database(source: impl std::fmt::Display) -> Self {
        Self::Database(source.to_string())
    }

    /// Create a song codec error from any displayable source.
    pub fn encoding(source: impl std::fmt::Display) -> Self {
        Self::Encoding(source.to_string())
    }
}

/// Result type alias for jukebox operations
pub type Result<T> = std::result::Result<T, Error>;
