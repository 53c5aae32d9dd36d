//! Session error types.

use evmias_fetch::FetchError;
use thiserror::Error;

use crate::protocol::ProtocolStep;

/// Failure of a session cache backend.
///
/// Never reaches callers of
/// [`SessionManager::get_valid_session`](crate::SessionManager::get_valid_session);
/// every cache failure degrades to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend is misconfigured or unavailable.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// An entry could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from the file backend.
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Redis command or connection failure.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors surfaced by session acquisition.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The upstream rejected a protocol step. Not retried.
    #[error("Authentication failed at {step}: {reason}")]
    Authentication {
        /// Step that failed.
        step: ProtocolStep,
        /// What the upstream answered.
        reason: String,
    },

    /// A protocol step could not reach the upstream, even after retries.
    #[error("Upstream unavailable at {step}: {source}")]
    Upstream {
        /// Step that failed.
        step: ProtocolStep,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// The session components could not be built.
    #[error("Session configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Returns the protocol step this error belongs to, if any.
    pub fn step(&self) -> Option<ProtocolStep> {
        match self {
            Self::Authentication { step, .. } | Self::Upstream { step, .. } => Some(*step),
            Self::Config(_) => None,
        }
    }
}
