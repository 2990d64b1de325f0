use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use airpost::config::{build_backend, NodeConfig};
use airpost::node::TelemetryNode;
use airpost::sim::{stock_sensors, ConsolePanel, UpdatePoller, WorkstationLink};
use airpost_types::ReadingSet;

#[derive(Parser, Debug)]
#[command(name = "airpost")]
#[command(about = "Air-quality telemetry node: samples sensors and ships readings to a collector")]
struct Args {
    /// Path to the node config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Telemetry period in seconds (overrides the config file)
    #[arg(short, long)]
    period: Option<u64>,

    /// Fail the simulated particulate sensor every Nth read
    #[arg(long)]
    dropouts: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = NodeConfig::load(args.config.as_deref())?;
    if let Some(period) = args.period {
        config.node.period_secs = period;
    }

    let backend = build_backend(&config)?;
    info!(
        "node {} delivering to {}",
        config.node.device_id,
        backend.endpoint()
    );

    let mut node = TelemetryNode::new(
        ReadingSet::stock(),
        stock_sensors(args.dropouts),
        backend,
        Box::new(WorkstationLink::default()),
        Box::new(ConsolePanel::default()),
        Box::new(UpdatePoller::new()),
    )
    .with_hostname(config.node.hostname.clone())
    .with_cadence(config.tick(), config.period());

    node.run().await;
    Ok(())
}
