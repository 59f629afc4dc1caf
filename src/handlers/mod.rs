use std::sync::Arc;

use crate::cache::{CacheStore, ReadThroughCache};
use crate::config::Config;
use crate::models::BillingQuery;
use crate::providers::{ComputeProvider, CostProvider};

pub mod billing;
pub mod health;
pub mod metrics_handler;
pub mod terminate;
pub mod usage;

pub type BillingCache = ReadThroughCache<dyn CostProvider, dyn CacheStore>;

/// Dependencies shared by every request handler, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Query served by `/billing` and `/cached-billing`, validated at startup
    pub billing_query: BillingQuery,
    pub cost_provider: Arc<dyn CostProvider>,
    pub compute_provider: Arc<dyn ComputeProvider>,
    pub store: Arc<dyn CacheStore>,
    pub billing_cache: Arc<BillingCache>,
}
