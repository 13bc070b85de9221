//! Cleo Query Server
//!
//! Loads a matchup snapshot and answers queries over TCP.
//!
//! ## Usage
//!
//! ```bash
//! cleo-server --snapshot matchups.cleo --port 14002
//!
//! # Swap in a freshly packed snapshot without restarting
//! kill -HUP $(pidof cleo-server)
//! ```
//!
//! ## Environment Variables
//!
//! - `CLEO_SNAPSHOT`: Snapshot path
//! - `CLEO_HOST` / `CLEO_PORT`: Listen address
//! - `CLEO_CONCURRENT_SESSIONS`: Serve several connections at once
//! - `RUST_LOG`: Log filter

use anyhow::Context;
use clap::Parser;
use cleo::{logging, Config, IndexHandle, QueryServer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cleo-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve matchup queries from a snapshot")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot to serve (default: from config)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Listen port (default: from config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen host (default: from config)
    #[arg(long)]
    host: Option<String>,

    /// Serve several connections at once
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::resolve(args.config.as_deref())?;
    logging::init(&config.logging);

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if args.concurrent {
        config.server.concurrent_sessions = true;
    }
    let snapshot = args.snapshot.unwrap_or(config.index.snapshot_path.clone());

    tracing::info!("Starting Cleo query server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading snapshot {:?}", snapshot);

    let handle = Arc::new(
        IndexHandle::open(&snapshot)
            .with_context(|| format!("Failed to load snapshot {:?}", snapshot))?,
    );
    tracing::info!("Index loaded: {}", handle.snapshot().await.stats());

    #[cfg(unix)]
    spawn_reload_on_hangup(Arc::clone(&handle))?;

    let server = QueryServer::bind(config.server.clone(), handle)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.address()))?;

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Reload the snapshot from disk on SIGHUP
#[cfg(unix)]
fn spawn_reload_on_hangup(handle: Arc<IndexHandle>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading snapshot");
            match handle.reload().await {
                Ok(index) => tracing::info!("Index reloaded: {}", index.stats()),
                Err(e) => tracing::error!(error = %e, "Reload failed, keeping current index"),
            }
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
