use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{BillingQuery, Granularity};

/// Environment variable prefix, e.g. `COST_GATEWAY__CACHE__TTL_SECONDS=60`
pub const ENV_PREFIX: &str = "COST_GATEWAY";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// "text" or "json"
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub ttl_seconds: u64,
    /// Upper bound on a single cache round-trip
    pub timeout_seconds: u64,
    pub key_prefix: String,
    /// Coalesce concurrent misses on the same key into one upstream fetch
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://redis:6379".to_string(),
            ttl_seconds: 3600,
            timeout_seconds: 3,
            key_prefix: "billing".to_string(),
            single_flight: false,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Falls back to AWS_REGION / AWS_DEFAULT_REGION, then us-east-1
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Shared config/credentials profile; falls back to AWS_PROFILE, then "default"
    pub profile: Option<String>,
    /// Overrides the regional endpoint of every AWS service (LocalStack, tests)
    pub endpoint_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            profile: None,
            endpoint_url: None,
            timeout_seconds: 5,
        }
    }
}

impl AwsConfig {
    pub fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "us-east-1".to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Base URL for an AWS service, honouring `endpoint_url` when set.
    pub fn service_endpoint(&self, service: &str) -> String {
        match &self.endpoint_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}.amazonaws.com", service, self.region()),
        }
    }
}

/// Query window served by `/billing` and `/cached-billing`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BillingConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub granularity: Granularity,
    pub metrics: Vec<String>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2023, 11, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 11, 30).unwrap_or_default(),
            granularity: Granularity::Daily,
            metrics: vec!["UnblendedCost".to_string()],
        }
    }
}

impl BillingConfig {
    pub fn query(&self) -> Result<BillingQuery, AppError> {
        BillingQuery::new(
            self.start_date,
            self.end_date,
            self.granularity,
            self.metrics.clone(),
        )
    }
}

/// Load configuration from an optional TOML file layered under environment
/// variables.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("billing.metrics")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("server.port must be non-zero");
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!(
            "server.log_format must be 'text' or 'json', got '{}'",
            cfg.server.log_format
        );
    }

    if cfg.cache.ttl_seconds == 0 {
        anyhow::bail!("cache.ttl_seconds must be greater than zero");
    }

    if cfg.cache.timeout_seconds == 0 {
        anyhow::bail!("cache.timeout_seconds must be greater than zero");
    }

    if cfg.cache.backend == CacheBackend::Redis && cfg.cache.redis_url.trim().is_empty() {
        anyhow::bail!("cache.redis_url is required when cache.backend = \"redis\"");
    }

    if cfg.aws.timeout_seconds == 0 {
        anyhow::bail!("aws.timeout_seconds must be greater than zero");
    }

    if let Some(endpoint) = &cfg.aws.endpoint_url {
        url::Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("aws.endpoint_url '{}' is invalid: {}", endpoint, e))?;
    }

    cfg.billing
        .query()
        .map_err(|e| anyhow::anyhow!("billing: {}", e.message()))?;

    Ok(())
}
