//! Fetch error types.

use std::time::Duration;
use thiserror::Error;

use crate::retry::{RetryDecision, classify};

/// Longest body excerpt kept on a status error.
const BODY_PREVIEW_LEN: usize = 200;

// ============================================================================
// Fetch Error
// ============================================================================

/// Error type for upstream fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (refused, reset, broken body stream).
    #[error("Transport error for {url}: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// The request did not complete in time.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Timeout that was applied.
        timeout: Duration,
    },

    /// The upstream answered with a non-2xx status.
    #[error("Upstream returned HTTP {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// First characters of the response body.
        body_preview: String,
    },

    /// The request could not be built (bad URL, bad header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// A structured payload was absent or did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Retryable failures exhausted the attempt budget.
    #[error("Request to {url} failed after {attempts} attempts: {source}")]
    Exhausted {
        /// Requested URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// The last error seen.
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Builds a status error, keeping only a short body excerpt.
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body_preview: body.chars().take(BODY_PREVIEW_LEN).collect(),
        }
    }

    /// Maps a reqwest error raised while executing a request.
    pub fn from_reqwest(url: &str, timeout: Duration, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Returns the HTTP status carried by this error, looking through `Exhausted`.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Exhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Short name of the error kind, for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ClientBuild(_) => "client_build",
            Self::Decode(_) => "decode",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    /// Returns true if the retry policy would try again after this error.
    pub fn is_retryable(&self) -> bool {
        classify(self) == RetryDecision::Retryable
    }
}

// ============================================================================
// Tests
// ============================================================================
