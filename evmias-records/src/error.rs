//! Record fetching errors.

use evmias_fetch::FetchError;
use thiserror::Error;

/// Errors from record fetchers.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The upstream call failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response carried no structured payload.
    #[error("No structured payload for {resource}")]
    NoPayload {
        /// Resource being fetched.
        resource: &'static str,
    },

    /// The payload was structured but held no record.
    #[error("No {resource} record in response")]
    NotFound {
        /// Resource being fetched.
        resource: &'static str,
    },

    /// The payload did not have the expected shape.
    #[error("Unexpected {resource} payload: {message}")]
    Shape {
        /// Resource being fetched.
        resource: &'static str,
        /// What did not match.
        message: String,
    },

    /// Search parameters were rejected before any call was made.
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),
}
