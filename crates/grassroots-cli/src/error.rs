use std::io;

use grassroots_core::delivery::DeliveryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] grassroots_core::Error),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Could not resolve a {0} directory for this platform; pass --db-path/--config or set GRASSROOTS_DB_PATH")]
    NoPlatformDir(&'static str),
    #[error(
        "No ingestion endpoint configured. Set \"endpoint\" in {0} or GRASSROOTS_ENDPOINT."
    )]
    EndpointNotConfigured(String),
    #[error("Invalid clock state file {path}: {message}")]
    ClockState { path: String, message: String },
}

impl CliError {
    /// Whether running the same command again may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Core(error) => error.is_retryable(),
            _ => false,
        }
    }
}
