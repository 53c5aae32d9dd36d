//! Cookie set persistence on top of a [`SessionCache`].

use evmias_core::{CacheSettings, CookieSet};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::SessionCache;
use crate::error::CacheError;

/// Reads and writes the session cookie set under one configured key.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    key: String,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store using the key and TTL from the settings.
    pub fn new(cache: Arc<dyn SessionCache>, settings: &CacheSettings) -> Self {
        Self {
            cache,
            key: settings.key.clone(),
            ttl: settings.ttl(),
        }
    }

    /// Cache key in use.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// TTL applied on every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Loads the cached cookie set.
    ///
    /// Every failure reads as a miss. Entries that cannot be decoded are
    /// deleted so the next call does not trip over them again.
    pub async fn load(&self) -> Option<CookieSet> {
        let bytes = match self.cache.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!(key = %self.key, "No cached session");
                return None;
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Session cache read failed");
                return None;
            }
        };

        let cookies = match decode(&bytes) {
            Decoded::Cookies(cookies) => cookies,
            Decoded::NotAnObject => {
                error!(key = %self.key, "Cached session is not a cookie mapping");
                return None;
            }
            Decoded::Corrupt(reason) => {
                let preview: String = String::from_utf8_lossy(&bytes).chars().take(100).collect();
                error!(key = %self.key, error = %reason, raw = %preview, "Cached session is corrupt, deleting");
                if let Err(e) = self.cache.delete(&self.key).await {
                    warn!(key = %self.key, error = %e, "Failed to delete corrupt session entry");
                }
                return None;
            }
        };

        if cookies.is_empty() {
            debug!(key = %self.key, "Cached session is empty");
            return None;
        }
        info!(key = %self.key, cookies = cookies.len(), "Loaded cached session");
        Some(cookies)
    }

    /// Writes the cookie set with the configured TTL.
    pub async fn save(&self, cookies: &CookieSet) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(cookies)?;
        self.cache.set(&self.key, &bytes, self.ttl).await?;
        info!(key = %self.key, ttl_secs = self.ttl.as_secs(), "Session cached");
        Ok(())
    }

    /// Removes the cached cookie set.
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        self.cache.delete(&self.key).await?;
        info!(key = %self.key, "Cached session removed");
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

enum Decoded {
    Cookies(CookieSet),
    NotAnObject,
    Corrupt(String),
}

fn decode(bytes: &[u8]) -> Decoded {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ Value::Object(_)) => match serde_json::from_value(value) {
            Ok(cookies) => Decoded::Cookies(cookies),
            Err(e) => Decoded::Corrupt(e.to_string()),
        },
        Ok(_) => Decoded::NotAnObject,
        Err(e) => Decoded::Corrupt(e.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
