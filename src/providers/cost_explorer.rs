use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, warn};

use super::CostProvider;
use crate::aws::{format_aws_error, AwsServiceClient};
use crate::config::AwsConfig;
use crate::error::AppError;
use crate::metrics;
use crate::models::{BillingQuery, BillingResult};

const OPERATION: &str = "GetCostAndUsage";
const TARGET: &str = "AWSInsightsIndexService.GetCostAndUsage";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// AWS Cost Explorer `GetCostAndUsage` over the JSON 1.1 protocol.
///
/// URL: `https://ce.{region}.amazonaws.com/`
/// Auth: AWS SigV4 signing (service = "ce")
#[derive(Clone)]
pub struct CostExplorerClient {
    aws: AwsServiceClient,
}

impl CostExplorerClient {
    pub fn new(http: Client, cfg: &AwsConfig) -> Self {
        Self {
            aws: AwsServiceClient::new(http, cfg, "ce"),
        }
    }
}

#[async_trait]
impl CostProvider for CostExplorerClient {
    fn name(&self) -> &str {
        "cost_explorer"
    }

    async fn fetch(&self, query: &BillingQuery) -> Result<BillingResult, AppError> {
        let body = serde_json::to_vec(&query.to_request_body())
            .map_err(|e| AppError::Internal(format!("Failed to serialize query: {}", e)))?;

        let started = Instant::now();
        let result = self
            .aws
            .post(CONTENT_TYPE, &[("X-Amz-Target", TARGET)], body)
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_provider_request(OPERATION, "error", started.elapsed());
                return Err(e);
            }
        };

        if !response.status.is_success() {
            metrics::record_provider_request(OPERATION, "error", started.elapsed());
            let message = parse_json_error(&response.body, response.status.as_u16());
            warn!(status = %response.status, "Cost Explorer rejected request: {}", message);
            return Err(AppError::Provider(message));
        }

        metrics::record_provider_request(OPERATION, "ok", started.elapsed());

        let payload: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            AppError::Provider(format!("Malformed {} response: {}", OPERATION, e))
        })?;

        debug!(
            start = %query.start(),
            end = %query.end(),
            "Fetched cost and usage"
        );

        Ok(BillingResult(payload))
    }
}

/// Turn a JSON 1.1 error body into an SDK-style message.
///
/// AWS sends `{"__type": "com.amazon...#ValidationException", "message": "..."}`;
/// some services capitalise `Message`.
fn parse_json_error(body: &str, status: u16) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|v| v.get("__type"))
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status));

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("Message")))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.trim().to_string()
            }
        });

    format_aws_error(&code, OPERATION, &message)
}
