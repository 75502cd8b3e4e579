//! Fetch gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 SUPERVISOR                   │
//!                         │  roster · autoscaler · ban tracker · timers  │
//!                         └───────▲──────────────────────────┬───────────┘
//!                    request events│                          │ ban snapshots
//!                                  │                          ▼
//!     Client ───────▶ ┌────────────┴─────────┐    ┌──────────────────────┐
//!     (shared socket) │ worker: admission    │ …  │ worker: admission    │
//!                     │   → rpc session      │    │   → rpc session      │
//!                     │   → fetch            │    │   → fetch            │
//!                     └──────────────────────┘    └──────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use fetch_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use fetch_gateway::lifecycle::{wait_for_signal, Shutdown};
use fetch_gateway::observability::{init_logging, init_metrics};
use fetch_gateway::Supervisor;

#[derive(Parser)]
#[command(name = "fetch-gateway")]
#[command(about = "Supervised worker pool serving getURLContents", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fetch-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        min_workers = config.pool.resolved_min_workers(),
        max_workers = config.pool.max_workers,
        fetch_timeout_secs = config.fetch.timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let supervisor = Supervisor::bind(config)?;
    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
        signal.trigger();
    });

    supervisor.run(shutdown.subscribe()).await?;
    Ok(())
}
