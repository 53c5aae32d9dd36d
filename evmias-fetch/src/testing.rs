//! Scriptable transport for tests.
//!
//! Available under `cfg(test)` and with the `testing` feature, so that
//! downstream crates can drive the fetch client without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;
use crate::request::FetchRequest;
use crate::response::RawResponse;
use crate::transport::Transport;

type Handler = dyn Fn(&FetchRequest) -> Result<RawResponse, FetchError> + Send + Sync;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The request as executed.
    pub request: FetchRequest,
    /// Timeout the client applied.
    pub timeout: Duration,
}

/// In-memory transport answering from a handler and recording every call.
pub struct MockTransport {
    handler: Box<Handler>,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// Answers every request with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&FetchRequest) -> Result<RawResponse, FetchError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers requests with the given replies in order, then fails every
    /// further request with a fatal error.
    pub fn sequence(replies: Vec<Result<RawResponse, FetchError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::new(move |request| {
            queue
                .lock()
                .map_err(|_| FetchError::InvalidRequest("mock queue poisoned".to_string()))?
                .pop_front()
                .unwrap_or_else(|| {
                    Err(FetchError::InvalidRequest(format!(
                        "no scripted reply left for {}",
                        request.label()
                    )))
                })
        })
    }

    /// Delays every answer by `latency` (on the tokio clock).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// `c/m` pairs (or the URL when absent) of every call, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| {
                let request = &call.request;
                match (request.query_value("c"), request.query_value("m")) {
                    (Some(c), Some(m)) => format!("{c}/{m}"),
                    _ => request.url().to_string(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                request: request.clone(),
                timeout,
            });
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.handler)(request)
    }
}
