use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cost_gateway::{config::ServerConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.get_command();

    // `start` initializes tracing itself once the configured log format is known
    if !matches!(command, cli::Commands::Start) {
        init_tracing(&ServerConfig {
            log_level: "warn".to_string(),
            ..ServerConfig::default()
        });
    }

    match command {
        cli::Commands::Start => commands::start::execute(&args.config).await?,
        cli::Commands::ListInstances => commands::instances::execute(&args.config).await?,
        cli::Commands::Test => commands::test::execute(&args.config).await?,
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Version => {
            println!("cost-gateway v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
