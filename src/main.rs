use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fleet_control::config::{load_config, FleetConfig};
use fleet_control::lifecycle::{spawn_signal_handler, Shutdown};
use fleet_control::observability::{logging, metrics};
use fleet_control::HttpServer;

#[derive(Parser)]
#[command(name = "fleet-control", version, about = "Media fleet control plane")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => FleetConfig::default(),
    };

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fleet-control starting");

    tracing::info!(
        config_file = ?args.config,
        bind_address = %config.listener.bind_address,
        servers = config.servers.len(),
        monitor_enabled = config.monitor.enabled,
        admin_auth = config.admin.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    HttpServer::new(config).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
