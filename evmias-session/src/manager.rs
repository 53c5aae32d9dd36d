//! Session manager.
//!
//! Hands out a cookie set the upstream currently accepts: the cached one if
//! a probe confirms it, otherwise a freshly acquired one that is written
//! back to the cache.
//!
//! Concurrent callers that all miss the cache each run their own
//! acquisition. The last write wins, and any complete cookie set is as good
//! as another.

use evmias_core::{CookieSet, Settings, UpstreamSettings};
use evmias_fetch::{FetchClient, FetchRequest, browser_headers};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{SessionCache, cache_from_settings};
use crate::error::{CacheError, SessionError};
use crate::protocol::AcquisitionProtocol;
use crate::store::SessionStore;

/// Entry point for obtaining a valid upstream session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: FetchClient,
    upstream: UpstreamSettings,
    protocol: AcquisitionProtocol,
    store: SessionStore,
}

impl SessionManager {
    /// Creates a manager over an existing client and cache.
    pub fn new(client: FetchClient, settings: &Settings, cache: Arc<dyn SessionCache>) -> Self {
        let protocol = AcquisitionProtocol::new(
            client.clone(),
            settings.upstream.clone(),
            settings.credentials.clone(),
        );
        Self {
            client,
            upstream: settings.upstream.clone(),
            protocol,
            store: SessionStore::new(cache, &settings.cache),
        }
    }

    /// Builds the pooled client and the configured cache backend.
    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        let client = FetchClient::from_settings(&settings.http)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        let cache = cache_from_settings(&settings.cache)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self::new(client, settings, cache))
    }

    /// The fetch client shared with record fetchers.
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// The underlying cookie store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Returns a usable cookie set.
    ///
    /// Fails only when acquisition fails. Cache trouble of any kind behaves
    /// like a miss.
    #[instrument(skip(self))]
    pub async fn get_valid_session(&self) -> Result<CookieSet, SessionError> {
        let Some(cached) = self.store.load().await else {
            info!("No usable cached session, acquiring a new one");
            return self.refresh().await;
        };

        if self.validate(&cached).await {
            // The entry may have lapsed between the probe and now.
            if let Some(cookies) = self.store.load().await {
                debug!("Using cached session");
                return Ok(cookies);
            }
            warn!("Cached session vanished after validation, acquiring a new one");
        } else {
            info!("Cached session rejected, acquiring a new one");
            if let Err(e) = self.store.invalidate().await {
                warn!(error = %e, "Failed to delete rejected session");
            }
        }
        self.refresh().await
    }

    /// Probes the upstream with `cookies`.
    ///
    /// Any failure, including transport errors, reads as invalid.
    pub async fn validate(&self, cookies: &CookieSet) -> bool {
        let request = FetchRequest::post(&self.upstream.base_url)
            .controller("Common", "getCurrentDateTime")
            .headers(browser_headers(&self.upstream))
            .form([("is_activerules", "true")])
            .cookies(cookies)
            .raise_for_status(false);

        match self.client.fetch(request).await {
            Ok(response) if response.status == 200 && response.json.is_some() => {
                info!("Session probe succeeded");
                true
            }
            Ok(response) => {
                warn!(
                    status = response.status,
                    has_json = response.json.is_some(),
                    "Session probe rejected cookies"
                );
                false
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Session probe failed, treating cookies as invalid");
                false
            }
        }
    }

    /// Acquires a fresh session and caches it.
    ///
    /// A failed cache write is logged and the fresh cookies are returned
    /// anyway.
    pub async fn refresh(&self) -> Result<CookieSet, SessionError> {
        let cookies = self.protocol.acquire().await?;
        if let Err(e) = self.store.save(&cookies).await {
            error!(error = %e, "Failed to cache new session");
        }
        Ok(cookies)
    }

    /// Drops the cached session.
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        self.store.invalidate().await
    }
}

// ============================================================================
// Tests
// ============================================================================
