//! HTTP transport seam.
//!
//! The [`Transport`] trait is the single point where bytes leave the
//! process. [`ReqwestTransport`] wraps one pooled `reqwest::Client` that is
//! shared by every call; tests substitute a scripted transport.

use async_trait::async_trait;
use evmias_core::{CookieSet, HttpSettings};
use reqwest::{Client, header};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::request::{FetchRequest, RequestBody};
use crate::response::RawResponse;

/// Idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 16;

// ============================================================================
// Transport Trait
// ============================================================================

/// Executes a single HTTP exchange.
///
/// Implementations must be safe to share between concurrent callers.
/// A completed exchange is `Ok` whatever its status; only failures to
/// complete the exchange are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request with the given timeout.
    async fn execute(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError>;
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Builds the pooled client.
    ///
    /// Redirects are not followed: the portal signals an expired session by
    /// redirecting to its login page, and that must surface as a non-2xx
    /// status rather than as an HTML page with status 200.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { inner: client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { inner: client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    async fn execute(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        let url = request.url();
        let mut builder = self
            .inner
            .request(request.method().clone(), url)
            .timeout(timeout);

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        for (name, value) in request.header_pairs() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.cookie_set().is_empty() {
            builder = builder.header(header::COOKIE, request.cookie_set().to_header_value());
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Raw(text) => builder.body(text.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout, &e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let cookies: CookieSet = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        debug!(status, cookies = cookies.len(), "Response received");

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout, &e))?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            cookies,
            body,
        })
    }
}
