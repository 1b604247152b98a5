//! forged, the agent pool autoscaler daemon.
//!
//! One long-running process, no subcommands. Everything is configured
//! through the environment; see `forge-core` for the recognized
//! variables. The process exits 0 on clean shutdown, non-zero on a
//! configuration failure at startup or when the build queue could not be
//! resumed after a downscale.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use forge_core::{Config, LogFormat};
use forgescale_cluster::AsgCluster;
use forgescale_engine::Engine;
use forgescale_queue::HttpQueue;

#[derive(Parser)]
#[command(name = "forged", about = "Autoscaler for CI build agent pools", version)]
struct Cli {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "starting forged");

    // ── Wire the ports ─────────────────────────────────────────

    let queue = Arc::new(
        HttpQueue::new(
            &config.server.proto,
            &config.server.host,
            config.server.auth_token.expose(),
        )
        .context("failed to build queue client")?,
    );
    info!(host = %config.server.host, "build server client initialized");

    let cluster = Arc::new(AsgCluster::from_env(&config.agent.autoscaling_group).await);
    info!(
        group = %config.agent.autoscaling_group,
        "agent cluster client initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // ── Run the control loop ───────────────────────────────────

    Engine::new(&config, queue, cluster).run(shutdown_rx).await?;

    info!("forged stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.debug {
            "debug".parse().unwrap()
        } else {
            "info".parse().unwrap()
        }
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
