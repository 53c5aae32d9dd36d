//! JSON output formatting.

use anyhow::Result;
use evmias_core::CookieSet;
use evmias_session::SessionStore;
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a session. Cookie values are shortened.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutput {
    pub cache_key: String,
    pub ttl_secs: u64,
    pub cookies: BTreeMap<String, String>,
}

impl SessionOutput {
    /// Describes `cookies` as stored under `store`.
    pub fn new(store: &SessionStore, cookies: &CookieSet) -> Self {
        Self {
            cache_key: store.key().to_string(),
            ttl_secs: store.ttl().as_secs(),
            cookies: cookies.redacted(),
        }
    }
}

/// Result of probing the cached session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutput {
    pub key: String,
    pub cached: bool,
    pub valid: bool,
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Serializes any output value.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(rendered)
    }
}
