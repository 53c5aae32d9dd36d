//! Session cache backends.
//!
//! A [`SessionCache`] is a plain byte store with per-entry TTL. The bytes
//! are the serialized cookie set; [`SessionStore`](crate::SessionStore)
//! owns the encoding.

use async_trait::async_trait;
use evmias_core::{CacheBackend, CacheSettings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CacheError;
use crate::file_cache::FileSessionCache;

// ============================================================================
// Cache Trait
// ============================================================================

/// Key-value store holding session entries with a time-to-live.
///
/// Implementations must be safe to share between concurrent callers.
/// Entries past their TTL behave as absent.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Reads an entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Writes an entry that expires `ttl` after now. Overwrites any previous value.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Removes an entry. Removing a missing entry is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Builds the backend selected in the settings.
pub fn cache_from_settings(settings: &CacheSettings) -> Result<Arc<dyn SessionCache>, CacheError> {
    match &settings.backend {
        CacheBackend::Memory => {
            debug!("Using in-memory session cache");
            Ok(Arc::new(MemorySessionCache::new()))
        }
        CacheBackend::File { dir } => {
            debug!(dir = %dir.display(), "Using file session cache");
            Ok(Arc::new(FileSessionCache::new(dir.clone())))
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis { url } => {
            debug!("Using redis session cache");
            Ok(Arc::new(crate::redis_cache::RedisSessionCache::open(url)?))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis { .. } => Err(CacheError::Backend(
            "redis backend requested but built without the `redis` feature".to_string(),
        )),
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// Process-local cache. Entries expire on the tokio clock.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionCache {
    entries: Arc<RwLock<HashMap<String, (Vec<u8>, Instant)>>>,
}

impl MemorySessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                debug!(key, "Memory cache entry expired");
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
