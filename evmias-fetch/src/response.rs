//! Upstream responses and payload decoding.

use evmias_core::CookieSet;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Longest text excerpt written to logs.
const LOG_PREVIEW_LEN: usize = 200;

// ============================================================================
// Raw Response
// ============================================================================

/// What a transport hands back for one completed exchange.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as received.
    pub headers: Vec<(String, String)>,
    /// Cookies set by the response.
    pub cookies: CookieSet,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates an empty response with a status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Creates a JSON response.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    /// Creates a text response with the given content type.
    pub fn text(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", content_type)
            .with_body(body.into())
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a response cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

// ============================================================================
// Fetch Result
// ============================================================================

/// A decoded upstream response.
///
/// `json` is `None` whenever no structured interpretation was possible,
/// which is different from the upstream returning an empty collection.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keys lowercased.
    pub headers: BTreeMap<String, String>,
    /// Cookies set by the response.
    pub cookies: CookieSet,
    /// Raw body bytes.
    pub content: Vec<u8>,
    /// Body decoded as UTF-8 (lossy).
    pub text: String,
    /// Structured payload, when the content type allowed one and it parsed.
    pub json: Option<Value>,
}

impl FetchResult {
    /// Decodes a raw response for the given URL.
    pub fn decode(raw: RawResponse, url: &str) -> Self {
        let headers: BTreeMap<String, String> = raw
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let text = String::from_utf8_lossy(&raw.body).into_owned();
        let content_type = headers
            .get("content-type")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        let json = decode_payload(&content_type, &text, url);

        Self {
            status: raw.status,
            headers,
            cookies: raw.cookies,
            content: raw.body,
            text,
            json,
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the structured payload or a decode error.
    pub fn require_json(&self) -> Result<&Value, FetchError> {
        self.json.as_ref().ok_or_else(|| {
            FetchError::Decode(format!(
                "no structured payload (status {}, content-type {:?})",
                self.status,
                self.header("content-type").unwrap_or("")
            ))
        })
    }

    /// Narrows the structured payload into a typed value.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let value = self.require_json()?;
        serde_json::from_value(value.clone()).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Attempts to read a structured payload.
///
/// JSON content types are decoded; `text/html` is probed as well because the
/// portal serves JSON under that type on some endpoints. Failures are logged
/// and yield `None`.
fn decode_payload(content_type: &str, text: &str, url: &str) -> Option<Value> {
    if content_type.contains("application/json") {
        if text.trim().is_empty() {
            debug!(url = %url, "JSON content type with empty body");
            return None;
        }
        match serde_json::from_str(text) {
            Ok(value) => {
                debug!(url = %url, "Decoded JSON response");
                Some(value)
            }
            Err(e) => {
                warn!(
                    url = %url,
                    error = %e,
                    body = %preview(text),
                    "Failed to decode JSON response"
                );
                None
            }
        }
    } else if content_type.contains("text/html") {
        if text.trim().is_empty() {
            debug!(url = %url, "HTML content type with empty body");
            return None;
        }
        match serde_json::from_str(text) {
            Ok(value) => {
                debug!(url = %url, "Decoded JSON embedded in text/html response");
                Some(value)
            }
            Err(_) => {
                debug!(url = %url, "text/html response is not JSON");
                None
            }
        }
    } else {
        debug!(url = %url, content_type = %content_type, "Content type not decoded");
        None
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_PREVIEW_LEN).collect();
    if text.chars().count() > LOG_PREVIEW_LEN {
        out.push_str("...");
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
