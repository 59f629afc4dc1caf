use wiremock::{
    matchers::{header, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

const TARGET: &str = "AWSInsightsIndexService.GetCostAndUsage";

/// Representative GetCostAndUsage response
pub fn cost_and_usage_payload() -> serde_json::Value {
    serde_json::json!({
        "GroupDefinitions": [],
        "ResultsByTime": [
            {
                "TimePeriod": { "Start": "2023-11-01", "End": "2023-11-02" },
                "Total": { "UnblendedCost": { "Amount": "4.2071", "Unit": "USD" } },
                "Groups": [],
                "Estimated": false
            },
            {
                "TimePeriod": { "Start": "2023-11-02", "End": "2023-11-03" },
                "Total": { "UnblendedCost": { "Amount": "3.9914", "Unit": "USD" } },
                "Groups": [],
                "Estimated": false
            }
        ],
        "DimensionValueAttributes": []
    })
}

/// Mount a successful GetCostAndUsage mock that must be hit exactly `expected_calls` times.
pub async fn mount_cost_explorer_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", TARGET))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cost_and_usage_payload()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a GetCostAndUsage mock that rejects every request.
pub async fn mount_cost_explorer_error(server: &MockServer, status: u16, error_type: &str, message: &str) {
    Mock::given(method("POST"))
        .and(header("x-amz-target", TARGET))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "__type": format!("com.amazonaws.awsinsightsindexservice#{}", error_type),
            "message": message,
        })))
        .mount(server)
        .await;
}
