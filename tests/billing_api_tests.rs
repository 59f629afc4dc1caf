// End-to-end tests for the billing routes against a mocked Cost Explorer

#[path = "integration/mocks/mod.rs"]
mod mocks;
#[path = "integration/helpers/mod.rs"]
mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cost_gateway::cache::CacheStore;
use cost_gateway::config::CacheBackend;
use cost_gateway::server::{build_state, create_router};
use helpers::{build_test_state, create_test_config, read_json};
use mocks::{cost_and_usage_payload, mount_cost_explorer_error, mount_cost_explorer_ok};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

fn metrics_handle() -> Arc<metrics_exporter_prometheus::PrometheusHandle> {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    Arc::new(recorder.handle())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_cached_billing_fetches_once_and_caches_for_an_hour() {
    let server = MockServer::start().await;
    mount_cost_explorer_ok(&server, 1).await;

    let test = build_test_state(create_test_config(&server.uri()));
    let key = test.state.billing_cache.key_for(&test.state.billing_query);
    let app = create_router(test.state.clone(), metrics_handle());

    let first = app.clone().oneshot(get("/cached-billing")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(read_json(first).await, cost_and_usage_payload());

    let ttl = test.store.ttl(&key).expect("entry written");
    assert!(ttl <= Duration::from_secs(3600));
    assert!(ttl > Duration::from_secs(3590));

    let second = app.oneshot(get("/cached-billing")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(read_json(second).await, cost_and_usage_payload());

    // MockServer verifies the single upstream call on drop
}

#[tokio::test]
async fn test_billing_route_always_goes_upstream() {
    let server = MockServer::start().await;
    mount_cost_explorer_ok(&server, 2).await;

    let test = build_test_state(create_test_config(&server.uri()));
    let app = create_router(test.state, metrics_handle());

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/billing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, cost_and_usage_payload());
    }
    assert!(test.store.is_empty());
}

#[tokio::test]
async fn test_provider_error_is_500_and_not_cached() {
    let server = MockServer::start().await;
    mount_cost_explorer_error(&server, 400, "ValidationException", "Start date must be before end date").await;

    let test = build_test_state(create_test_config(&server.uri()));
    let app = create_router(test.state, metrics_handle());

    let response = app.oneshot(get("/cached-billing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        serde_json::json!({
            "error": "An error occurred (ValidationException) when calling the GetCostAndUsage operation: Start date must be before end date"
        })
    );
    assert!(test.store.is_empty());
}

#[tokio::test]
async fn test_corrupt_entry_is_refetched_and_overwritten() {
    let server = MockServer::start().await;
    mount_cost_explorer_ok(&server, 1).await;

    let test = build_test_state(create_test_config(&server.uri()));
    let key = test.state.billing_cache.key_for(&test.state.billing_query);
    test.store
        .set_ex(&key, "\u{0}garbage".to_string(), Duration::from_secs(3600))
        .await
        .unwrap();

    let app = create_router(test.state, metrics_handle());
    let response = app.oneshot(get("/cached-billing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = test.store.get(&key).await.unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored, cost_and_usage_payload());
}

#[tokio::test]
async fn test_upstream_timeout_surfaces_as_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(cost_and_usage_payload())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.aws.timeout_seconds = 1;
    let test = build_test_state(config);
    let app = create_router(test.state, metrics_handle());

    let response = app.oneshot(get("/billing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(cost_and_usage_payload())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.cache.single_flight = true;
    let test = build_test_state(config);
    let app = create_router(test.state, metrics_handle());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let app = app.clone();
        tasks.spawn(async move { app.oneshot(get("/cached-billing")).await.unwrap().status() });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_cache_outage_is_500_and_skips_upstream() {
    let server = MockServer::start().await;
    mount_cost_explorer_ok(&server, 0).await;

    let mut config = create_test_config(&server.uri());
    config.cache.backend = CacheBackend::Redis;
    config.cache.redis_url = "redis://127.0.0.1:9".to_string();
    config.cache.timeout_seconds = 1;
    let state = build_state(config).unwrap();
    let app = create_router(state, metrics_handle());

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/cached-billing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
    }
}
