//! Redis-backed session cache shared by every bridge instance.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::cache::SessionCache;
use crate::error::CacheError;

/// Session cache on a redis server (`GET`, `SET .. EX`, `DEL`).
///
/// The connection is opened on first use and multiplexed afterwards.
pub struct RedisSessionCache {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisSessionCache {
    /// Parses the connection URL. Does not connect.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                debug!("Connecting to redis");
                self.client.get_multiplexed_async_connection().await
            })
            .await?;
        Ok(connection.clone())
    }
}

impl std::fmt::Debug for RedisSessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionCache")
            .field("connected", &self.connection.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        // EX takes whole seconds and rejects zero.
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_parses_url_without_connecting() {
        let cache = RedisSessionCache::open("redis://127.0.0.1:6379/0").unwrap();
        assert!(!cache.connection.initialized());
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(RedisSessionCache::open("not-a-redis-url").is_err());
    }
}
