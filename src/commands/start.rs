use anyhow::Result;
use colored::Colorize;
use cost_gateway::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes tracing with the configured format and
/// runs the server until a shutdown signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting cost gateway...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server);

    info!(config = %config_path.display(), "Configuration loaded");

    server::start_server(cfg).await
}
