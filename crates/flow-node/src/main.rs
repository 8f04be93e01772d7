//! Tradeflow pipeline node - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Event-driven signal-to-settlement pipeline node
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FLOW_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    flow_telemetry::init_logging()?;

    info!("Starting tradeflow node v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > FLOW_CONFIG env var > env-only defaults
    let config_path = args.config.or_else(|| std::env::var("FLOW_CONFIG").ok());
    if let Some(path) = &config_path {
        info!(config_path = %path, "Loading configuration");
    }
    let config = flow_node::NodeConfig::load(config_path.as_deref())?;

    let app = flow_node::Application::new(config);
    app.run().await?;

    Ok(())
}
