//! Resilient fetch client.
//!
//! [`FetchClient::send`] performs one logged attempt. [`FetchClient::fetch`]
//! wraps it with the retry policy: retryable failures are repeated with
//! exponential backoff until the attempt budget runs out, fatal ones are
//! returned at once.

use evmias_core::HttpSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::error::FetchError;
use crate::request::{FetchRequest, RequestBody};
use crate::response::FetchResult;
use crate::retry::{RetryDecision, RetryPolicy, classify};
use crate::transport::{ReqwestTransport, Transport};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest parameter or payload excerpt logged in debug mode.
const PARAMS_PREVIEW_LEN: usize = 300;
const PAYLOAD_PREVIEW_LEN: usize = 500;

/// HTTP client with retry and request logging.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    default_timeout: Duration,
    debug_http: bool,
}

impl FetchClient {
    /// Creates a client over any transport with default settings.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry_policy: RetryPolicy::default(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug_http: false,
        }
    }

    /// Creates a client over the pooled reqwest transport.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(settings)?;
        Ok(Self::new(Arc::new(transport))
            .with_timeout(settings.timeout())
            .with_debug_http(settings.debug_http))
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the timeout used when a request has none.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enables verbose request/response logging.
    #[must_use]
    pub fn with_debug_http(mut self, enabled: bool) -> Self {
        self.debug_http = enabled;
        self
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Executes a request, retrying transient failures.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.send(&request).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if classify(&error) == RetryDecision::Fatal {
                return Err(error);
            }

            if !self.retry_policy.allows_another(attempt) {
                error!(
                    url = %request.url(),
                    attempts = attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(FetchError::Exhausted {
                    url: request.url().to_string(),
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = self.retry_policy.delay_for_attempt(attempt);
            warn!(
                url = %request.url(),
                attempt,
                kind = error.kind(),
                error = %error,
                delay_secs = delay.as_secs_f64(),
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Executes a single attempt without retries.
    pub async fn send(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let label = request.label();
        let timeout = request.timeout_override().unwrap_or(self.default_timeout);

        debug!(request = %label, "Request started");
        if self.debug_http {
            self.log_request_details(&label, request);
        }

        let start = Instant::now();
        let raw = match self.transport.execute(request, timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    request = %label,
                    elapsed_ms = start.elapsed().as_millis(),
                    error = %e,
                    "Request failed"
                );
                return Err(e);
            }
        };

        let result = FetchResult::decode(raw, request.url());
        let elapsed_ms = start.elapsed().as_millis();

        if request.raises_for_status() && !result.is_success() {
            warn!(request = %label, status = result.status, elapsed_ms, "Non-success status");
            return Err(FetchError::status(request.url(), result.status, &result.text));
        }

        debug!(request = %label, status = result.status, elapsed_ms, "Request finished");
        if self.debug_http {
            let payload = result
                .json
                .as_ref()
                .map_or_else(|| "None".to_string(), ToString::to_string);
            debug!(request = %label, json = %truncate(&payload, PAYLOAD_PREVIEW_LEN), "Response payload");
        }

        Ok(result)
    }

    fn log_request_details(&self, label: &str, request: &FetchRequest) {
        if !request.query_pairs().is_empty() {
            let query = format!("{:?}", request.query_pairs());
            debug!(request = %label, params = %truncate(&query, PARAMS_PREVIEW_LEN), "Query");
        }
        match request.body() {
            RequestBody::Empty => {}
            RequestBody::Form(fields) => {
                let form = format!("{:?}", redact_form(fields));
                debug!(request = %label, data = %truncate(&form, PARAMS_PREVIEW_LEN), "Form body");
            }
            RequestBody::Raw(text) => {
                debug!(request = %label, bytes = text.len(), "Raw body");
            }
        }
        if !request.cookie_set().is_empty() {
            debug!(request = %label, cookies = ?request.cookie_set().redacted(), "Cookies");
        }
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("retry_policy", &self.retry_policy)
            .field("default_timeout", &self.default_timeout)
            .field("debug_http", &self.debug_http)
            .finish_non_exhaustive()
    }
}

/// Form fields that never reach the logs.
const SECRET_FIELDS: &[&str] = &["psw", "password"];

fn redact_form(fields: &[(String, String)]) -> Vec<(&str, &str)> {
    fields
        .iter()
        .map(|(k, v)| {
            if SECRET_FIELDS.contains(&k.as_str()) {
                (k.as_str(), "<redacted>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RawResponse;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>) -> FetchClient {
        FetchClient::new(transport.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_503_then_succeeds() {
        let transport = Arc::new(MockTransport::sequence(vec![
            Ok(RawResponse::new(503)),
            Ok(RawResponse::new(503)),
            Ok(RawResponse::new(503)),
            Ok(RawResponse::json(200, &json!({"ok": true}))),
        ]));

        let started = tokio::time::Instant::now();
        let result = client(&transport)
            .fetch(FetchRequest::get("https://portal/"))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.json, Some(json!({"ok": true})));
        // One initial attempt plus exactly three retries.
        assert_eq!(transport.call_count(), 4);
        // 2s + 4s + 8s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_5xx_exhausts_budget() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::new(502))));

        let err = client(&transport)
            .fetch(FetchRequest::get("https://portal/"))
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 5);
        match err {
            FetchError::Exhausted { attempts, source, .. } => {
                assert_eq!(attempts, 5);
                assert_eq!(source.status_code(), Some(502));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_4xx_is_not_retried() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::new(404))));

        let err = client(&transport)
            .fetch(FetchRequest::get("https://portal/"))
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(err.status_code(), Some(404));
        assert!(matches!(err, FetchError::Status { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let transport = Arc::new(MockTransport::sequence(vec![
            Err(FetchError::Transport {
                url: "https://portal/".to_string(),
                message: "connection reset".to_string(),
            }),
            Err(FetchError::Timeout {
                url: "https://portal/".to_string(),
                timeout: Duration::from_secs(30),
            }),
            Ok(RawResponse::new(200)),
        ]));

        let result = client(&transport)
            .fetch(FetchRequest::get("https://portal/"))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raise_for_status_disabled_returns_error_status() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::text(500, "text/html", "oops"))
        }));

        let result = client(&transport)
            .fetch(FetchRequest::get("https://portal/").raise_for_status(false))
            .await
            .unwrap();

        assert_eq!(result.status, 500);
        assert_eq!(result.text, "oops");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_override_reaches_transport() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::new(200))));
        let client = client(&transport).with_timeout(Duration::from_secs(30));

        client
            .fetch(FetchRequest::get("https://portal/").timeout(Duration::from_secs(3)))
            .await
            .unwrap();
        client.fetch(FetchRequest::get("https://portal/")).await.unwrap();

        let timeouts: Vec<_> = transport.calls().iter().map(|c| c.timeout).collect();
        assert_eq!(timeouts, vec![Duration::from_secs(3), Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_send_is_single_attempt() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::new(503))));

        let err = client(&transport)
            .send(&FetchRequest::get("https://portal/"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_redact_form_hides_password() {
        let fields = vec![
            ("login".to_string(), "doctor".to_string()),
            ("psw".to_string(), "hunter2".to_string()),
        ];
        let shown = format!("{:?}", redact_form(&fields));
        assert!(shown.contains("doctor"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
