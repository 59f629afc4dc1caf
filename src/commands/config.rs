use anyhow::Result;
use colored::Colorize;
use cost_gateway::{
    config::{self, Config},
    logging::{mask_secret, redact_url},
};
use std::path::Path;

/// Execute the config show command
///
/// Displays the effective configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", toml::to_string_pretty(&sanitized)?);

    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());

    config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();

    sanitized.aws.access_key_id = sanitized.aws.access_key_id.as_deref().map(mask_secret);
    sanitized.aws.secret_access_key = sanitized.aws.secret_access_key.as_ref().map(|_| "***".to_string());
    sanitized.aws.session_token = sanitized.aws.session_token.as_ref().map(|_| "***".to_string());
    sanitized.cache.redis_url = redact_url(&sanitized.cache.redis_url);

    sanitized
}
