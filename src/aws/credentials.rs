use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::AwsConfig;
use crate::logging::mask_secret;

/// Credentials without their own expiry are re-resolved this often
const STATIC_REFRESH_SECS: i64 = 300;
/// Expiring credentials are refreshed this long before they lapse
const EXPIRY_BUFFER_SECS: i64 = 300;
const CONTAINER_HOST: &str = "http://169.254.170.2";
const CONTAINER_TIMEOUT: Duration = Duration::from_secs(2);

/// AWS credentials used for SigV4 signing.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Set for temporary credentials handed out by STS-backed providers
    pub expires_at: Option<DateTime<Utc>>,
    /// Where the credentials came from ("config", "environment", "profile:<name>", "container")
    pub source: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &mask_secret(&self.access_key_id))
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .field("source", &self.source)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl AwsCredentials {
    /// Resolve credentials that need no network call, in order:
    /// explicit configuration, `AWS_*` environment variables, then the shared
    /// credentials and config files for the selected profile.
    ///
    /// `env` is consulted for every environment variable, including `HOME`.
    pub fn resolve_with(cfg: &AwsConfig, env: impl Fn(&str) -> Option<String>) -> Option<Self> {
        if let (Some(access_key_id), Some(secret_access_key)) = (
            non_empty(cfg.access_key_id.clone()),
            non_empty(cfg.secret_access_key.clone()),
        ) {
            return Some(Self {
                access_key_id,
                secret_access_key,
                session_token: non_empty(cfg.session_token.clone())
                    .or_else(|| non_empty(env("AWS_SESSION_TOKEN"))),
                expires_at: None,
                source: "config".to_string(),
            });
        }

        if let (Some(access_key_id), Some(secret_access_key)) = (
            non_empty(env("AWS_ACCESS_KEY_ID")),
            non_empty(env("AWS_SECRET_ACCESS_KEY")),
        ) {
            return Some(Self {
                access_key_id,
                secret_access_key,
                session_token: non_empty(env("AWS_SESSION_TOKEN")),
                expires_at: None,
                source: "environment".to_string(),
            });
        }

        let profile = non_empty(cfg.profile.clone())
            .or_else(|| non_empty(env("AWS_PROFILE")))
            .unwrap_or_else(|| "default".to_string());
        profile_credentials(&profile, &env)
    }
}

fn home_dir(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    non_empty(env("HOME")).map(PathBuf::from).or_else(dirs::home_dir)
}

fn shared_file(
    env: &impl Fn(&str) -> Option<String>,
    override_var: &str,
    default_name: &str,
) -> Option<PathBuf> {
    non_empty(env(override_var))
        .map(PathBuf::from)
        .or_else(|| home_dir(env).map(|home| home.join(".aws").join(default_name)))
}

/// Sections of an INI profile file. Unreadable or malformed files are skipped.
fn read_profile_file(path: &Path) -> HashMap<String, HashMap<String, String>> {
    let parsed = config::Config::builder()
        .add_source(
            config::File::from(path)
                .format(config::FileFormat::Ini)
                .required(false),
        )
        .build()
        .and_then(|c| c.try_deserialize::<HashMap<String, config::Value>>());

    let sections = match parsed {
        Ok(sections) => sections,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable AWS profile file");
            return HashMap::new();
        }
    };

    sections
        .into_iter()
        .filter_map(|(name, value)| {
            let table = value.into_table().ok()?;
            let entries = table
                .into_iter()
                .filter_map(|(k, v)| Some((k.to_ascii_lowercase(), v.into_string().ok()?)))
                .collect();
            Some((name, entries))
        })
        .collect()
}

fn find_section<'a>(
    sections: &'a HashMap<String, HashMap<String, String>>,
    name: &str,
) -> Option<&'a HashMap<String, String>> {
    sections.get(name).or_else(|| {
        sections
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn credentials_from_section(section: &HashMap<String, String>, source: String) -> Option<AwsCredentials> {
    Some(AwsCredentials {
        access_key_id: non_empty(section.get("aws_access_key_id").cloned())?,
        secret_access_key: non_empty(section.get("aws_secret_access_key").cloned())?,
        session_token: non_empty(section.get("aws_session_token").cloned()),
        expires_at: None,
        source,
    })
}

/// `[name]` in the credentials file wins over `[profile name]` (or
/// `[default]`) in the config file.
fn profile_credentials(profile: &str, env: &impl Fn(&str) -> Option<String>) -> Option<AwsCredentials> {
    let source = format!("profile:{}", profile);

    if let Some(path) = shared_file(env, "AWS_SHARED_CREDENTIALS_FILE", "credentials") {
        let sections = read_profile_file(&path);
        if let Some(creds) =
            find_section(&sections, profile).and_then(|s| credentials_from_section(s, source.clone()))
        {
            return Some(creds);
        }
    }

    let path = shared_file(env, "AWS_CONFIG_FILE", "config")?;
    let sections = read_profile_file(&path);
    let section_name = if profile == "default" {
        "default".to_string()
    } else {
        format!("profile {}", profile)
    };
    find_section(&sections, &section_name).and_then(|s| credentials_from_section(s, source))
}

/// ECS/EKS container credentials endpoint response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct CachedCredentials {
    credentials: AwsCredentials,
    refresh_at: DateTime<Utc>,
}

/// Default credential chain with caching.
///
/// Static sources are tried first (see [`AwsCredentials::resolve_with`]),
/// then the container credentials endpoint
/// (`AWS_CONTAINER_CREDENTIALS_FULL_URI` / `_RELATIVE_URI`). A resolved set
/// is reused until shortly before it expires; a failed resolution is not
/// cached, so the next call tries again.
pub struct CredentialsProvider {
    http: Client,
    config: AwsConfig,
    env: EnvLookup,
    cached: RwLock<Option<CachedCredentials>>,
}

impl CredentialsProvider {
    pub fn new(http: Client, cfg: &AwsConfig) -> Self {
        Self::with_env(http, cfg, Arc::new(|name| std::env::var(name).ok()))
    }

    pub fn with_env(http: Client, cfg: &AwsConfig, env: EnvLookup) -> Self {
        Self {
            http,
            config: cfg.clone(),
            env,
            cached: RwLock::new(None),
        }
    }

    /// Current credentials, or `None` when no source yields any.
    pub async fn credentials(&self) -> Option<AwsCredentials> {
        let now = Utc::now();
        if let Some(cached) = self.cached.read().await.as_ref() {
            if now < cached.refresh_at {
                return Some(cached.credentials.clone());
            }
        }

        let mut slot = self.cached.write().await;
        // Another caller may have refreshed while we waited
        if let Some(cached) = slot.as_ref() {
            if now < cached.refresh_at {
                return Some(cached.credentials.clone());
            }
        }

        let credentials = self.resolve().await?;
        let refresh_at = match credentials.expires_at {
            Some(expires_at) => expires_at - chrono::Duration::seconds(EXPIRY_BUFFER_SECS),
            None => now + chrono::Duration::seconds(STATIC_REFRESH_SECS),
        };
        debug!(source = %credentials.source, %refresh_at, "Resolved AWS credentials");

        *slot = Some(CachedCredentials {
            credentials: credentials.clone(),
            refresh_at,
        });
        Some(credentials)
    }

    async fn resolve(&self) -> Option<AwsCredentials> {
        let env = &*self.env;
        if let Some(creds) = AwsCredentials::resolve_with(&self.config, env) {
            return Some(creds);
        }

        let uri = non_empty(env("AWS_CONTAINER_CREDENTIALS_FULL_URI")).or_else(|| {
            non_empty(env("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI"))
                .map(|path| format!("{}{}", CONTAINER_HOST, path))
        })?;
        let token = non_empty(env("AWS_CONTAINER_AUTHORIZATION_TOKEN"));

        match self.fetch_container_credentials(&uri, token.as_deref()).await {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!(uri = %uri, error = %e, "Container credentials request failed");
                None
            }
        }
    }

    async fn fetch_container_credentials(
        &self,
        uri: &str,
        token: Option<&str>,
    ) -> Result<AwsCredentials, reqwest::Error> {
        let mut req = self.http.get(uri).timeout(CONTAINER_TIMEOUT);
        if let Some(token) = token {
            req = req.header("Authorization", token);
        }

        let body: ContainerCredentials = req.send().await?.error_for_status()?.json().await?;
        Ok(AwsCredentials {
            access_key_id: body.access_key_id,
            secret_access_key: body.secret_access_key,
            session_token: body.token,
            expires_at: body.expiration,
            source: "container".to_string(),
        })
    }
}
