use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    cache::{CacheStore, MemoryStore, ReadThroughCache, RedisStore},
    config::{CacheBackend, Config},
    handlers::{self, AppState},
    logging::redact_url,
    metrics,
    providers::{ComputeProvider, CostExplorerClient, CostProvider, Ec2Client},
    signals::setup_signal_handlers,
};

/// Start the gateway server
///
/// This function:
/// 1. Initializes metrics
/// 2. Builds provider clients, the cache store and the read-through cache
/// 3. Binds to the configured address
/// 4. Serves requests until SIGTERM/SIGINT, then drains connections
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = build_state(config)?;
    log_startup_summary(&state);

    let app = create_router(state, metrics_handle);

    info!("Starting cost gateway on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Construct every shared dependency from configuration.
pub fn build_state(config: Config) -> Result<AppState> {
    let http_client = reqwest::Client::builder()
        .timeout(config.aws.timeout())
        .build()?;

    let billing_query = config
        .billing
        .query()
        .map_err(|e| anyhow::anyhow!("Invalid billing configuration: {}", e.message()))?;

    let cost_explorer = CostExplorerClient::new(http_client.clone(), &config.aws);
    let ec2 = Ec2Client::new(http_client, &config.aws);
    let cost_provider: Arc<dyn CostProvider> = Arc::new(cost_explorer);
    let compute_provider: Arc<dyn ComputeProvider> = Arc::new(ec2);

    let store = build_store(&config)?;

    let billing_cache = Arc::new(
        ReadThroughCache::new(
            cost_provider.clone(),
            store.clone(),
            config.cache.key_prefix.clone(),
        )
        .with_single_flight(config.cache.single_flight),
    );

    Ok(AppState {
        config: Arc::new(config),
        billing_query,
        cost_provider,
        compute_provider,
        store,
        billing_cache,
    })
}

fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Redis => Arc::new(RedisStore::new(
            &config.cache.redis_url,
            config.cache.timeout(),
        )?),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState, metrics_handle: Arc<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::health::home))
        .route("/redis-test", get(handlers::health::redis_test))
        .route("/billing", get(handlers::billing::get_billing))
        .route("/cached-billing", get(handlers::billing::get_cached_billing))
        .route("/terminate", post(handlers::terminate::terminate_resource))
        .route("/usage", get(handlers::usage::get_usage))
        .with_state(state);

    Router::new()
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(metrics_handle)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

fn log_startup_summary(state: &AppState) {
    let cfg = &state.config;
    info!(
        "Cache: backend={} ttl={}s single_flight={}{}",
        state.store.backend(),
        cfg.cache.ttl_seconds,
        cfg.cache.single_flight,
        match cfg.cache.backend {
            CacheBackend::Redis => format!(" url={}", redact_url(&cfg.cache.redis_url)),
            CacheBackend::Memory => String::new(),
        }
    );
    info!(
        "Billing window: {} .. {} ({}, metrics: {})",
        state.billing_query.start(),
        state.billing_query.end(),
        state.billing_query.granularity(),
        state.billing_query.metrics().join(",")
    );
    info!("AWS region: {}", cfg.aws.region());
}
