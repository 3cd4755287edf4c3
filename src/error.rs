//! Error types shared across the crate.

use thiserror::Error;

/// Errors surfaced by the data model, the directory and the ambient layers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A constructor argument was empty or missing; no object was produced.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The same provider instance was registered twice.
    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    /// The same listener instance was added twice.
    #[error("Listener already registered: {0}")]
    DuplicateListener(String),

    /// The directory was shut down and accepts no new registrations.
    #[error("Directory has been shut down")]
    DirectoryClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A description file could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<toml::de::Error> for ApiError {
    fn from(err: toml::de::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}
