use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and describe all metrics.
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

fn init_metric_descriptions() {
    describe_counter!(
        "cost_gateway_cache_lookups_total",
        "Read-through cache lookups by result (hit, miss, corrupt, error)"
    );
    describe_counter!(
        "cost_gateway_provider_requests_total",
        "Upstream AWS calls by operation and status"
    );
    describe_histogram!(
        "cost_gateway_provider_request_duration_seconds",
        "Upstream AWS call duration in seconds"
    );
    describe_gauge!(
        "cost_gateway_info",
        "Gateway version and build information"
    );

    gauge!("cost_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record the outcome of a cache lookup
pub fn record_cache_lookup(result: &'static str) {
    counter!("cost_gateway_cache_lookups_total", "result" => result).increment(1);
}

/// Record one upstream call
pub fn record_provider_request(operation: &str, status: &'static str, duration: Duration) {
    counter!(
        "cost_gateway_provider_requests_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "cost_gateway_provider_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}
