//! Core error types for the EVMIAS bridge.

use thiserror::Error;

/// Core error type, raised while building configuration or core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required setting was not provided.
    #[error("Missing setting: {0}")]
    MissingSetting(String),

    /// A setting was provided but could not be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error while reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
