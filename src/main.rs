//! CAD bridge server.
//!
//! ```text
//!   browser / client                  cad-bridge                        CAD backend
//!  ──────────────────▶ ┌──────────────────────────────────────┐ ──────▶ ┌───────────┐
//!   multipart upload   │ http ─▶ pipeline pool ─▶ upstream    │         │ SolidWork │
//!                      │                      ◀─ multipart    │ ◀────── │  service  │
//!  ◀────────────────── │ workspace ◀─ classifier ◀─ parser   │         └───────────┘
//!   JSON manifest      └──────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       <tmp_root>/<request_id>/
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use cad_bridge::config::{load_config, validate_config, BridgeConfig, ConfigError};
use cad_bridge::lifecycle::signals::wait_for_signal;
use cad_bridge::observability::{logging, metrics};
use cad_bridge::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "cad-bridge", version, about = "HTTP bridge in front of a CAD backend")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(long, env = "BRIDGE_BIND")]
    bind: Option<String>,

    /// Override the upstream base URL
    #[arg(long, env = "BRIDGE_UPSTREAM")]
    upstream: Option<String>,

    /// Override the workspace root directory
    #[arg(long, env = "BRIDGE_TMP_ROOT")]
    tmp_root: Option<String>,
}

fn resolve_config(args: &Args) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &args.upstream {
        config.upstream.base_url = upstream.clone();
    }
    if let Some(tmp_root) = &args.tmp_root {
        config.storage.tmp_root = tmp_root.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("cad-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        tmp_root = %config.storage.tmp_root,
        max_concurrent_jobs = config.pipeline.max_concurrent_jobs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
