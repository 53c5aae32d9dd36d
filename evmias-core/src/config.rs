//! Configuration for the bridge.
//!
//! [`Settings`] is built once at startup, either from the process
//! environment ([`Settings::from_env`]) or from a JSON file
//! ([`Settings::load_from`]), and then handed to each component by value.
//! Nothing reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::CoreError;

/// Default cache key for the serialized cookie set.
pub const DEFAULT_CACHE_KEY: &str = "evmias_cookies";

/// Default session TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default redis port when only a host is configured.
const DEFAULT_REDIS_PORT: &str = "6379";

// ============================================================================
// Settings
// ============================================================================

/// Complete, immutable configuration of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where the upstream portal lives.
    pub upstream: UpstreamSettings,
    /// Credentials consumed by the acquisition protocol.
    pub credentials: Credentials,
    /// Session cache configuration.
    #[serde(default)]
    pub cache: CacheSettings,
    /// HTTP transport configuration.
    #[serde(default)]
    pub http: HttpSettings,
}

/// Upstream portal location and the fixed headers it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL accepting `c`/`m` query pairs.
    pub base_url: String,
    /// Value of the `Origin` header.
    pub origin: String,
    /// Value of the `Referer` header.
    pub referer: String,
    /// Value of the `X-Gwt-Module-Base` header. Derived from the base URL when unset.
    #[serde(default)]
    pub module_base: Option<String>,
    /// First day (`dd.mm.yyyy`) of the default discharge search period.
    #[serde(default)]
    pub search_period_start: Option<String>,
}

impl UpstreamSettings {
    /// Joins a path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Returns the GWT module base for the dispatch servlet.
    pub fn module_base(&self) -> String {
        self.module_base
            .clone()
            .unwrap_or_else(|| self.endpoint("ermp/"))
    }
}

/// Opaque inputs to the acquisition protocol.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Portal login.
    pub login: String,
    /// Portal password. Never serialized.
    #[serde(skip_serializing)]
    pub password: String,
    /// Pre-shared secret posted to the dispatch servlet. Never serialized.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Build permutation sent as `X-Gwt-Permutation`.
    pub permutation: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("permutation", &self.permutation)
            .finish()
    }
}

/// Where the cookie set is cached between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local memory. Not shared between instances.
    #[default]
    Memory,
    /// One JSON file per key inside a directory.
    File {
        /// Directory holding the cache files.
        dir: PathBuf,
    },
    /// A redis server.
    Redis {
        /// Connection URL, e.g. `redis://localhost:6379/0`.
        url: String,
    },
}

/// Session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Key under which the cookie set is stored.
    #[serde(default = "default_cache_key")]
    pub key: String,
    /// Lifetime of a cached cookie set, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Storage backend.
    #[serde(default)]
    pub backend: CacheBackend,
}

impl CacheSettings {
    /// Returns the TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            ttl_secs: default_cache_ttl(),
            backend: CacheBackend::default(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Default timeout applied when a request carries none.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Log request parameters and response previews.
    #[serde(default)]
    pub debug_http: bool,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl HttpSettings {
    /// Returns the default timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            debug_http: false,
            accept_invalid_certs: false,
        }
    }
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Builds settings from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    ///
    /// Uses the same variable names as the deployed service's `.env` file.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).ok_or_else(|| CoreError::MissingSetting(name.to_string()));

        let upstream = UpstreamSettings {
            base_url: require("BASE_URL")?,
            origin: require("BASE_HEADERS_ORIGIN_URL")?,
            referer: require("BASE_HEADERS_REFERER_URL")?,
            module_base: get("EVMIAS_MODULE_BASE"),
            search_period_start: get("SEARCH_PERIOD_START_DATE"),
        };

        let credentials = Credentials {
            login: require("EVMIAS_LOGIN")?,
            password: require("EVMIAS_PASSWORD")?,
            secret: require("EVMIAS_SECRET")?,
            permutation: require("EVMIAS_PERMUTATION")?,
        };

        let backend = if let Some(host) = get("REDIS_HOST") {
            let port = get("REDIS_PORT").unwrap_or_else(|| DEFAULT_REDIS_PORT.to_string());
            let db = get("REDIS_DB").unwrap_or_else(|| "0".to_string());
            CacheBackend::Redis {
                url: format!("redis://{host}:{port}/{db}"),
            }
        } else if let Some(dir) = get("SESSION_CACHE_DIR") {
            CacheBackend::File { dir: PathBuf::from(dir) }
        } else {
            CacheBackend::Memory
        };

        let cache = CacheSettings {
            key: get("REDIS_COOKIES_KEY").unwrap_or_else(default_cache_key),
            ttl_secs: parse_or("REDIS_COOKIES_TTL", get("REDIS_COOKIES_TTL"), DEFAULT_CACHE_TTL_SECS)?,
            backend,
        };

        let http = HttpSettings {
            timeout_secs: parse_or("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS)?,
            debug_http: parse_flag("DEBUG_HTTP", get("DEBUG_HTTP"))?,
            accept_invalid_certs: parse_flag(
                "HTTP_ACCEPT_INVALID_CERTS",
                get("HTTP_ACCEPT_INVALID_CERTS"),
            )?,
        };

        let settings = Self {
            upstream,
            credentials,
            cache,
            http,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), CoreError> {
        Url::parse(&self.upstream.base_url).map_err(|e| {
            CoreError::InvalidConfig(format!("base_url '{}': {e}", self.upstream.base_url))
        })?;
        if self.cache.ttl_secs == 0 {
            return Err(CoreError::InvalidConfig("cache ttl must be positive".to_string()));
        }
        if self.cache.key.is_empty() {
            return Err(CoreError::InvalidConfig("cache key must not be empty".to_string()));
        }
        if self.http.timeout_secs == 0 {
            return Err(CoreError::InvalidConfig("http timeout must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_or(name: &str, raw: Option<String>, default: u64) -> Result<u64, CoreError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidConfig(format!("{name}: expected a number, got '{value}'"))),
    }
}

fn parse_flag(name: &str, raw: Option<String>) -> Result<bool, CoreError> {
    match raw.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(CoreError::InvalidConfig(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BASE_URL", "https://portal.example.org/"),
            ("BASE_HEADERS_ORIGIN_URL", "https://portal.example.org"),
            ("BASE_HEADERS_REFERER_URL", "https://portal.example.org/"),
            ("EVMIAS_LOGIN", "doctor"),
            ("EVMIAS_PASSWORD", "hunter2"),
            ("EVMIAS_SECRET", "7|0|4|opaque"),
            ("EVMIAS_PERMUTATION", "ABCDEF"),
        ])
    }

    fn settings_from(env: &HashMap<&str, &str>) -> Result<Settings, CoreError> {
        Settings::from_lookup(|name| env.get(name).map(|v| (*v).to_string()))
    }

    #[test]
    fn test_from_lookup_defaults() {
        let settings = settings_from(&base_env()).unwrap();

        assert_eq!(settings.credentials.login, "doctor");
        assert_eq!(settings.cache.key, DEFAULT_CACHE_KEY);
        assert_eq!(settings.cache.ttl(), Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
        assert_eq!(settings.http.timeout(), Duration::from_secs(30));
        assert!(!settings.http.debug_http);
    }

    #[test]
    fn test_missing_required_setting() {
        let mut env = base_env();
        env.remove("EVMIAS_SECRET");

        let err = settings_from(&env).unwrap_err();
        assert!(matches!(err, CoreError::MissingSetting(name) if name == "EVMIAS_SECRET"));
    }

    #[test]
    fn test_redis_backend_from_host() {
        let mut env = base_env();
        env.insert("REDIS_HOST", "cache");
        env.insert("REDIS_DB", "2");
        env.insert("REDIS_COOKIES_KEY", "evmias:cookies");
        env.insert("REDIS_COOKIES_TTL", "900");

        let settings = settings_from(&env).unwrap();
        assert_eq!(
            settings.cache.backend,
            CacheBackend::Redis {
                url: "redis://cache:6379/2".to_string()
            }
        );
        assert_eq!(settings.cache.key, "evmias:cookies");
        assert_eq!(settings.cache.ttl_secs, 900);
    }

    #[test]
    fn test_invalid_numbers_and_flags() {
        let mut env = base_env();
        env.insert("REDIS_COOKIES_TTL", "soon");
        assert!(matches!(settings_from(&env), Err(CoreError::InvalidConfig(_))));

        let mut env = base_env();
        env.insert("DEBUG_HTTP", "maybe");
        assert!(matches!(settings_from(&env), Err(CoreError::InvalidConfig(_))));

        let mut env = base_env();
        env.insert("DEBUG_HTTP", "True");
        assert!(settings_from(&env).unwrap().http.debug_http);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut env = base_env();
        env.insert("REDIS_COOKIES_TTL", "0");
        assert!(matches!(settings_from(&env), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint_and_module_base() {
        let settings = settings_from(&base_env()).unwrap();
        assert_eq!(
            settings.upstream.endpoint("ermp/servlets/dispatch.servlet"),
            "https://portal.example.org/ermp/servlets/dispatch.servlet"
        );
        assert_eq!(settings.upstream.module_base(), "https://portal.example.org/ermp/");
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let settings = settings_from(&base_env()).unwrap();
        let debug = format!("{:?}", settings.credentials);
        assert!(debug.contains("doctor"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("opaque"));
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "upstream": {
                    "base_url": "https://portal.example.org/",
                    "origin": "https://portal.example.org",
                    "referer": "https://portal.example.org/"
                },
                "credentials": {
                    "login": "doctor",
                    "password": "pw",
                    "secret": "s",
                    "permutation": "p"
                },
                "cache": { "ttl_secs": 60, "backend": { "kind": "file", "dir": "/tmp/evmias" } }
            }"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.cache.ttl_secs, 60);
        assert_eq!(settings.cache.key, DEFAULT_CACHE_KEY);
        assert_eq!(
            settings.cache.backend,
            CacheBackend::File {
                dir: PathBuf::from("/tmp/evmias")
            }
        );
        assert_eq!(settings.http.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_from_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "upstream": { "base_url": "not a url", "origin": "o", "referer": "r" },
                "credentials": { "login": "l", "password": "p", "secret": "s", "permutation": "p" }
            }"#,
        )
        .unwrap();

        assert!(matches!(Settings::load_from(&path), Err(CoreError::InvalidConfig(_))));
    }
}
