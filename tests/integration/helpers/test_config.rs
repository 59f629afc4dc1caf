use axum::{body::Body, response::Response};
use cost_gateway::{
    cache::{CacheStore, MemoryStore, ReadThroughCache},
    config::{CacheBackend, Config},
    handlers::AppState,
    providers::{ComputeProvider, CostExplorerClient, CostProvider, Ec2Client},
};
use std::sync::Arc;

/// App state plus a typed handle on the in-memory store for assertions
pub struct TestState {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

/// Config pointing every AWS call at `mock_url`, with static credentials
pub fn create_test_config(mock_url: &str) -> Config {
    let mut config = Config::default();
    config.cache.backend = CacheBackend::Memory;
    config.aws.region = Some("us-east-1".to_string());
    config.aws.endpoint_url = Some(mock_url.to_string());
    config.aws.access_key_id = Some("AKIDEXAMPLE".to_string());
    config.aws.secret_access_key = Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string());
    config.aws.timeout_seconds = 2;
    config
}

/// Build the same wiring as `server::build_state`, keeping the concrete store
pub fn build_test_state(config: Config) -> TestState {
    let http_client = reqwest::Client::new();
    let cost_provider: Arc<dyn CostProvider> =
        Arc::new(CostExplorerClient::new(http_client.clone(), &config.aws));
    let compute_provider: Arc<dyn ComputeProvider> =
        Arc::new(Ec2Client::new(http_client, &config.aws));

    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn CacheStore> = store.clone();

    let billing_cache = Arc::new(
        ReadThroughCache::new(
            cost_provider.clone(),
            dyn_store.clone(),
            config.cache.key_prefix.clone(),
        )
        .with_single_flight(config.cache.single_flight),
    );

    let state = AppState {
        billing_query: config.billing.query().expect("valid billing query"),
        config: Arc::new(config),
        cost_provider,
        compute_provider,
        store: dyn_store,
        billing_cache,
    };

    TestState { state, store }
}

/// Read a response body as JSON
pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
