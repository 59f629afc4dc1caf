use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{validate_resource_id, ComputeProvider};
use crate::aws::{format_aws_error, AwsResponse, AwsServiceClient};
use crate::config::AwsConfig;
use crate::error::AppError;
use crate::metrics;
use crate::models::{InstanceState, InstanceStateChange, ResponseMetadata, TerminationReceipt};

const API_VERSION: &str = "2016-11-15";
const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static INSTANCE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<instanceId>([^<]+)</instanceId>").unwrap());
static REQUEST_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:requestId|RequestID)>([^<]+)</(?:requestId|RequestID)>").unwrap()
});
static NEXT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<nextToken>([^<]+)</nextToken>").unwrap());
static CURRENT_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<currentState>\s*<code>(\d+)</code>\s*<name>([^<]+)</name>\s*</currentState>")
        .unwrap()
});
static PREVIOUS_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<previousState>\s*<code>(\d+)</code>\s*<name>([^<]+)</name>\s*</previousState>")
        .unwrap()
});
static ERROR_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<Code>([^<]+)</Code>").unwrap());
static ERROR_MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Message>(.*?)</Message>").unwrap());

/// AWS EC2 over the Query protocol.
///
/// URL: `https://ec2.{region}.amazonaws.com/`
/// Auth: AWS SigV4 signing (service = "ec2")
#[derive(Clone)]
pub struct Ec2Client {
    aws: AwsServiceClient,
}

impl Ec2Client {
    pub fn new(http: Client, cfg: &AwsConfig) -> Self {
        Self {
            aws: AwsServiceClient::new(http, cfg, "ec2"),
        }
    }

    async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
        // Serializer is !Send; keep it out of scope across the await
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("Action", action);
            form.append_pair("Version", API_VERSION);
            for (k, v) in params {
                form.append_pair(k, v);
            }
            form.finish().into_bytes()
        };

        let started = Instant::now();
        let response = match self.aws.post(CONTENT_TYPE, &[], body).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_provider_request(action, "error", started.elapsed());
                return Err(e);
            }
        };

        if !response.status.is_success() {
            metrics::record_provider_request(action, "error", started.elapsed());
            let message = parse_xml_error(&response, action);
            warn!(status = %response.status, "EC2 {} failed: {}", action, message);
            return Err(AppError::Provider(message));
        }

        metrics::record_provider_request(action, "ok", started.elapsed());
        Ok(response.body)
    }
}

#[async_trait]
impl ComputeProvider for Ec2Client {
    fn name(&self) -> &str {
        "ec2"
    }

    async fn terminate(&self, resource_id: &str) -> Result<TerminationReceipt, AppError> {
        let resource_id = validate_resource_id(resource_id)?;

        let body = self
            .call("TerminateInstances", &[("InstanceId.1", resource_id)])
            .await?;
        let receipt = parse_terminate_response(&body)?;

        info!(
            resource_id,
            instances = receipt.terminating_instances.len(),
            "Termination acknowledged"
        );
        Ok(receipt)
    }

    async fn list_instances(&self) -> Result<Vec<String>, AppError> {
        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let body = match &next_token {
                Some(token) => {
                    self.call("DescribeInstances", &[("NextToken", token.as_str())])
                        .await?
                }
                None => self.call("DescribeInstances", &[]).await?,
            };

            for id in parse_instance_ids(&body) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }

            next_token = capture(&NEXT_TOKEN_RE, &body);
            if next_token.is_none() {
                break;
            }
            debug!(collected = ids.len(), "Following DescribeInstances nextToken");
        }

        Ok(ids)
    }
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_state(re: &Regex, item: &str) -> Option<InstanceState> {
    let caps = re.captures(item)?;
    Some(InstanceState {
        code: caps.get(1)?.as_str().parse().ok()?,
        name: caps.get(2)?.as_str().to_string(),
    })
}

fn parse_terminate_response(body: &str) -> Result<TerminationReceipt, AppError> {
    let mut terminating_instances = Vec::new();

    for item in ITEM_RE.captures_iter(body) {
        let item = &item[1];
        let instance_id = capture(&INSTANCE_ID_RE, item);
        let current = parse_state(&CURRENT_STATE_RE, item);
        let previous = parse_state(&PREVIOUS_STATE_RE, item);

        match (instance_id, current, previous) {
            (Some(instance_id), Some(current_state), Some(previous_state)) => {
                terminating_instances.push(InstanceStateChange {
                    instance_id,
                    current_state,
                    previous_state,
                });
            }
            _ => {
                return Err(AppError::Provider(
                    "Malformed TerminateInstances response".to_string(),
                ))
            }
        }
    }

    Ok(TerminationReceipt {
        terminating_instances,
        response_metadata: ResponseMetadata {
            request_id: capture(&REQUEST_ID_RE, body).unwrap_or_default(),
        },
    })
}

fn parse_instance_ids(body: &str) -> Vec<String> {
    INSTANCE_ID_RE
        .captures_iter(body)
        .map(|c| unescape_xml(c[1].trim()))
        .collect()
}

/// EC2 errors look like `<Response><Errors><Error><Code/><Message/></Error></Errors>...`
fn parse_xml_error(response: &AwsResponse, action: &str) -> String {
    let code = capture(&ERROR_CODE_RE, &response.body)
        .unwrap_or_else(|| format!("HTTP{}", response.status.as_u16()));
    let message = capture(&ERROR_MESSAGE_RE, &response.body).unwrap_or_else(|| {
        let trimmed = response.body.trim();
        if trimmed.is_empty() {
            "Unknown error".to_string()
        } else {
            trimmed.to_string()
        }
    });
    format_aws_error(&code, action, &message)
}
