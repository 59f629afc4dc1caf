//! Key/value stores with per-entry expiry, and the read-through billing
//! cache built on top of them.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod read_through;
pub mod redis_store;

pub use memory::MemoryStore;
pub use read_through::ReadThroughCache;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("corrupt cache entry '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// String key/value storage where the store itself enforces expiry.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Backend name used in logs (e.g. "redis", "memory")
    fn backend(&self) -> &str;

    /// Value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
