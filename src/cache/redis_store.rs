use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{CacheError, CacheStore};
use crate::logging::redact_url;

/// Redis-backed store. Expiry is delegated to Redis via `SETEX`.
///
/// A single multiplexed connection is opened on first use and shared by every
/// request; `ConnectionManager` re-establishes it after a disconnect. Opening
/// lazily lets the server start before Redis is reachable. Every operation,
/// including the first connect, is bounded by `timeout`.
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
    display_url: String,
}

impl RedisStore {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout,
            display_url: redact_url(url),
        })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }

    /// Shared connection handle; clones are cheap and multiplex one socket.
    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!(url = %self.display_url, "Opening Redis connection");
                self.client.get_connection_manager().await
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_timeout(async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // EX takes whole seconds and rejects zero
        let seconds = ttl.as_secs().max(1);
        self.with_timeout(async {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(key, value, seconds).await?;
            Ok(())
        })
        .await
    }
}
