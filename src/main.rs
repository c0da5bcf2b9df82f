//! # TradeFlow Integrations Entry Point

use anyhow::{Context, anyhow};
use tracing::info;
use tradeflow::{config::ConfigLoader, server::run_server, telemetry::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;

    init_tracing(&config).context("failed to initialize tracing")?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(config = %redacted_json, "Effective configuration");
    }

    run_server(config).await.map_err(|e| anyhow!("{e}"))
}
