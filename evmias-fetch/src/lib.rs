// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # EVMIAS Fetch
//!
//! Upstream HTTP plumbing for the EVMIAS bridge.
//!
//! ## Fetch Client
//!
//! - [`client::FetchClient`] - One pooled client with retry and request logging
//! - [`retry::RetryPolicy`] - Attempt budget and exponential backoff
//! - [`retry::classify`] - Retryable vs fatal failures
//! - [`response::FetchResult`] - Decoded response with optional JSON payload
//!
//! ## Orchestration
//!
//! - [`gather::gather_all`] - Concurrent fan-out where each failure stays in its slot
//!
//! ## Example
//!
//! ```ignore
//! use evmias_fetch::{FetchClient, FetchRequest};
//!
//! let client = FetchClient::from_settings(&settings.http)?;
//! let result = client
//!     .fetch(FetchRequest::post(&settings.upstream.base_url).controller("Common", "getCurrentDateTime"))
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod gather;
pub mod headers;
pub mod request;
pub mod response;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use client::FetchClient;
pub use error::FetchError;
pub use gather::{FailureKind, TaskFailure, TaskOutcome, gather_all, gather_all_until};
pub use headers::{GWT_RPC_CONTENT_TYPE, USER_AGENT, browser_headers};
pub use request::{FetchRequest, RequestBody};
pub use response::{FetchResult, RawResponse};
pub use retry::{RetryDecision, RetryPolicy, classify};
pub use transport::{ReqwestTransport, Transport};
