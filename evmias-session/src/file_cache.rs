//! File-backed session cache.
//!
//! Each key lives in its own JSON file holding the value and an absolute
//! expiry time, so several processes on one host share the session.
//! Each write goes through its own temp file in the cache directory and
//! an atomic rename, so concurrent writers never see each other's partial
//! output and the last rename wins. On unix the files are readable by the
//! owner only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::SessionCache;
use crate::error::CacheError;

/// What is written to disk for one key.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    expires_at: DateTime<Utc>,
    value: String,
}

/// Session cache storing one file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    dir: PathBuf,
}

impl FileSessionCache {
    /// Uses `dir`, creating it on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    async fn remove_file(path: &Path) -> Result<(), CacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionCache for FileSessionCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache file");
                Self::remove_file(&path).await?;
                return Ok(None);
            }
        };

        if envelope.expires_at <= Utc::now() {
            debug!(path = %path.display(), "Cache file expired");
            Self::remove_file(&path).await?;
            return Ok(None);
        }

        Ok(Some(envelope.value.into_bytes()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let value = String::from_utf8(value.to_vec())
            .map_err(|e| CacheError::Backend(format!("cache value is not UTF-8: {e}")))?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Backend(format!("TTL out of range: {e}")))?;
        let envelope = Envelope {
            expires_at: Utc::now() + ttl,
            value,
        };

        ensure_dir(&self.dir).await?;
        let path = self.path_for(key);
        let json = serde_json::to_string(&envelope)?;

        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, json.as_bytes()))
            .await
            .map_err(|e| CacheError::Backend(format!("cache write task failed: {e}")))??;

        debug!(path = %path.display(), "Cache file written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        Self::remove_file(&self.path_for(key)).await
    }
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Creates the cache directory, owner-only on unix.
async fn ensure_dir(path: &Path) -> Result<(), CacheError> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    debug!(path = %path.display(), "Creating cache directory");
    tokio::fs::create_dir_all(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(())
}

/// Writes `bytes` to a fresh temp file next to `path`, then renames it over `path`.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    set_restrictive_permissions(file.path())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) -> Result<(), CacheError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_restrictive_permissions(_path: &Path) -> Result<(), CacheError> {
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
