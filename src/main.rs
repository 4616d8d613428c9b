//! CORS relay server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  CORS RELAY                  │
//!   Browser              │  ┌────────┐   ┌──────────┐   ┌────────────┐  │
//!   GET /api/proxy?url=… ┼─▶│  http  │──▶│  relay   │──▶│  dispatch  │──┼──▶ Target
//!                        │  │ server │   │ validate │   │ (reqwest)  │  │
//!                        │  └────────┘   │ cors     │   └─────┬──────┘  │
//!                        │       ▲       │ sanitize │         │         │
//!   ◀────────────────────┼───────┘       │ body     │◀────────┘         │
//!   status + 3 headers   │               │ translate│                   │
//!   + raw bytes + CORS   │               └──────────┘                   │
//!                        │  config · observability · lifecycle · net    │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cors_relay::config::{self, RelayConfig};
use cors_relay::lifecycle::{signals, Shutdown};
use cors_relay::observability::{logging, metrics};
use cors_relay::HttpServer;

#[derive(Parser)]
#[command(name = "cors-relay")]
#[command(about = "CORS-enabled HTTP forward relay", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CORS_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;

    tracing::info!("cors-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.listener.path,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        spoof_user_agent = config.relay.spoof_user_agent,
        verify_upstream_certificates = config.relay.verify_upstream_certificates,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
