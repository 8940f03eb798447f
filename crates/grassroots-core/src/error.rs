//! Error types for grassroots-core

use thiserror::Error;

/// Result type alias using grassroots-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in grassroots-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed event intent (unknown kind, player not on roster, ...)
    #[error("Invalid event: {0}")]
    Validation(String),

    /// Local durable store could not be written; the caller should retry
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Referenced entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap any storage-layer failure as a retryable `StorageUnavailable`.
    pub fn storage_unavailable(error: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(error.to_string())
    }

    /// Whether the failed action may succeed if simply attempted again.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Sqlite(_) | Self::Io(_))
    }
}
