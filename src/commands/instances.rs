use anyhow::Result;
use cost_gateway::{
    config,
    providers::{ComputeProvider, Ec2Client},
};
use std::path::Path;
use tracing::info;

/// Execute the list-instances command
///
/// Prints one EC2 instance ID per line so the output can be piped.
pub async fn execute(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let http_client = reqwest::Client::builder()
        .timeout(cfg.aws.timeout())
        .build()?;
    let ec2 = Ec2Client::new(http_client, &cfg.aws);

    let ids = ec2.list_instances().await?;
    info!(count = ids.len(), region = %cfg.aws.region(), "Listed instances");

    for id in ids {
        println!("{}", id);
    }

    Ok(())
}
