use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::credentials::CredentialsProvider;
use super::sigv4::{self, SigningScope};
use crate::config::AwsConfig;
use crate::error::AppError;

/// Raw response from an AWS endpoint.
#[derive(Debug)]
pub struct AwsResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Signs and sends requests to a single AWS service.
#[derive(Clone)]
pub struct AwsServiceClient {
    http: Client,
    credentials: Arc<CredentialsProvider>,
    region: String,
    service: &'static str,
    endpoint: String,
    timeout: Duration,
}

impl AwsServiceClient {
    pub fn new(http: Client, cfg: &AwsConfig, service: &'static str) -> Self {
        Self {
            credentials: Arc::new(CredentialsProvider::new(http.clone(), cfg)),
            http,
            region: cfg.region(),
            service,
            endpoint: cfg.service_endpoint(service),
            timeout: cfg.timeout(),
        }
    }

    /// POST `body` to the service root with SigV4 authentication.
    ///
    /// Transport failures (DNS, TLS, timeout) map to `AppError::Provider`;
    /// non-2xx statuses are returned to the caller for service-specific
    /// error parsing.
    pub async fn post(
        &self,
        content_type: &str,
        extra_headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<AwsResponse, AppError> {
        // Resolved per call; the provider caches until shortly before expiry
        let credentials = self
            .credentials
            .credentials()
            .await
            .ok_or_else(|| AppError::Provider("Unable to locate credentials".to_string()))?;

        let url_str = format!("{}/", self.endpoint);
        let url = url::Url::parse(&url_str)
            .map_err(|e| AppError::Config(format!("Invalid AWS endpoint '{}': {}", url_str, e)))?;

        let mut signed_input: Vec<(&str, &str)> = vec![("content-type", content_type)];
        signed_input.extend_from_slice(extra_headers);

        let signed_headers = sigv4::sign(
            "POST",
            &url,
            &signed_input,
            &body,
            &credentials,
            SigningScope {
                region: &self.region,
                service: self.service,
            },
        );

        let mut req = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header("Content-Type", content_type);

        for (key, value) in extra_headers {
            req = req.header(*key, *value);
        }
        for (key, value) in &signed_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        debug!(service = self.service, endpoint = %self.endpoint, "Sending AWS request");

        let response = req.body(body).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(AwsResponse { status, body })
    }
}

/// Format an AWS error the way the AWS CLI and SDKs print it.
pub fn format_aws_error(code: &str, operation: &str, message: &str) -> String {
    format!(
        "An error occurred ({}) when calling the {} operation: {}",
        code, operation, message
    )
}
