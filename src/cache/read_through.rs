use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CacheError, CacheStore};
use crate::error::AppError;
use crate::metrics;
use crate::models::{BillingQuery, BillingResult};
use crate::providers::CostProvider;

/// Cache-aside wrapper around a [`CostProvider`].
///
/// A hit is served from the store without touching the provider. On a miss
/// the provider is called once, the result is written with the caller's ttl
/// and then returned. Provider failures propagate and nothing is written.
/// Store failures on either side surface as `AppError::Cache`; only an
/// undecodable entry is downgraded to a miss.
///
/// Without single-flight, concurrent misses on the same key each call the
/// provider and the last write wins. With single-flight enabled, callers that
/// miss on the same key queue on a per-key lock and re-check the store before
/// fetching, so only the first one goes upstream.
pub struct ReadThroughCache<P: ?Sized, S: ?Sized> {
    provider: Arc<P>,
    store: Arc<S>,
    key_prefix: String,
    in_flight: Option<DashMap<String, Arc<Mutex<()>>>>,
}

impl<P, S> ReadThroughCache<P, S>
where
    P: CostProvider + ?Sized,
    S: CacheStore + ?Sized,
{
    pub fn new(provider: Arc<P>, store: Arc<S>, key_prefix: impl Into<String>) -> Self {
        Self {
            provider,
            store,
            key_prefix: key_prefix.into(),
            in_flight: None,
        }
    }

    /// Coalesce concurrent misses on the same key into one upstream fetch.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(DashMap::new);
        self
    }

    pub fn key_for(&self, query: &BillingQuery) -> String {
        query.cache_key(&self.key_prefix)
    }

    pub async fn get_or_fetch(
        &self,
        query: &BillingQuery,
        ttl: Duration,
    ) -> Result<BillingResult, AppError> {
        let key = self.key_for(query);

        if let Some(hit) = self.lookup(&key).await? {
            return Ok(hit);
        }

        let Some(in_flight) = &self.in_flight else {
            return self.fetch_and_store(&key, query, ttl).await;
        };

        let lock = in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            // Whoever held the lock before us may have filled the entry
            match self.lookup(&key).await {
                Ok(Some(hit)) => Ok(hit),
                Ok(None) => self.fetch_and_store(&key, query, ttl).await,
                Err(e) => Err(e),
            }
        };

        // Map copy + ours; anyone else still queued keeps the entry alive
        in_flight.remove_if(&key, |_, existing| {
            Arc::ptr_eq(existing, &lock) && Arc::strong_count(existing) <= 2
        });

        result
    }

    /// Read and decode an entry.
    ///
    /// An undecodable entry counts as a miss. A backend failure (unreachable,
    /// timed out) is an error: the provider is not called.
    async fn lookup(&self, key: &str) -> Result<Option<BillingResult>, AppError> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<BillingResult>(&raw) {
                Ok(result) => {
                    debug!(key, "Cache hit");
                    metrics::record_cache_lookup("hit");
                    Ok(Some(result))
                }
                Err(source) => {
                    let err = CacheError::Corrupt {
                        key: key.to_string(),
                        source,
                    };
                    warn!(error = %err, "Discarding cache entry");
                    metrics::record_cache_lookup("corrupt");
                    Ok(None)
                }
            },
            Ok(None) => {
                debug!(key, "Cache miss");
                metrics::record_cache_lookup("miss");
                Ok(None)
            }
            Err(e) => {
                warn!(key, backend = self.store.backend(), error = %e, "Cache read failed");
                metrics::record_cache_lookup("error");
                Err(e.into())
            }
        }
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        query: &BillingQuery,
        ttl: Duration,
    ) -> Result<BillingResult, AppError> {
        let result = self.provider.fetch(query).await?;

        let raw = serde_json::to_string(&result)
            .map_err(|e| AppError::Internal(format!("Failed to serialize billing result: {}", e)))?;

        if let Err(e) = self.store.set_ex(key, raw, ttl).await {
            warn!(key, backend = self.store.backend(), error = %e, "Cache write failed");
            return Err(e.into());
        }

        debug!(key, ttl_secs = ttl.as_secs(), provider = self.provider.name(), "Cached fresh result");
        Ok(result)
    }
}
