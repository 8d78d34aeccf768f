//! Admission gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                 ADMISSION GATEWAY                    │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌───────────┐   ┌──────────────┐     │
//!   ──────────────────┼─▶│ request  │──▶│ offender  │──▶│ trusted host │     │
//!                     │  │  facts   │   │  tracker  │   │    guard     │     │
//!                     │  └──────────┘   └───────────┘   └──────┬───────┘     │
//!                     │                                        ▼             │
//!                     │                 ┌───────────┐   ┌──────────────┐     │
//!   Client Response   │                 │  forward  │◀──│  CORS guard  │     │
//!   ◀─────────────────┼─────────────────│ +headers  │   │ / preflight  │     │
//!                     │                 └─────┬─────┘   └──────────────┘     │
//!                     │                       ▼                              │
//!                     │                   Upstream                           │
//!                     │                                                      │
//!                     │  config (tenants, clients, reload) · observability   │
//!                     │  admin API · lifecycle                               │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gateway::config::loader::{load_config, load_from_env};
use admission_gateway::config::watcher::ConfigWatcher;
use admission_gateway::lifecycle::{signals, Shutdown};
use admission_gateway::observability::{logging, metrics};
use admission_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "admission-gateway")]
#[command(about = "Tenant-aware request admission gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env(|name| std::env::var(name).ok())?,
    };

    logging::init(&config.observability);
    tracing::info!("admission-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tenants = config.tenants.len(),
        clients = config.clients.len(),
        max_attempts = config.offenders.max_attempts,
        production = config.security.production,
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

    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
