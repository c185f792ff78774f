//! Process entry point: parse CLI args, load configuration, init telemetry,
//! and run the sync TCP listener (§6.1) alongside the admin HTTP surface
//! (§6.2) until either stops.

mod admin;
mod config;
mod connection;
mod errors;
mod state;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Beehive sync server: TCP sync listener + admin HTTP surface.
#[derive(Parser, Debug)]
#[command(name = "beehive-server", about = "Multi-tenant sync server for embedded relational replicas")]
struct Cli {
    /// Directory of per-context `*.toml` configuration files (§6.6).
    #[arg(long, env = "BEEHIVE_CONFIG_DIR", default_value = "./config")]
    config_dir: std::path::PathBuf,

    /// Bind address for the sync TCP listener (§6.1).
    #[arg(long, env = "BEEHIVE_SYNC_ADDR", default_value = "[::]:9440")]
    sync_addr: SocketAddr,

    /// Bind address for the admin HTTP surface (§6.2).
    #[arg(long, env = "BEEHIVE_ADMIN_ADDR", default_value = "[::]:9441")]
    admin_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let configs = Arc::new(config::ConfigStore::load(&cli.config_dir).context("loading context configuration")?);
    let dao: Arc<dyn beehive_storage::Dao> = Arc::new(beehive_storage::MemoryDao::new());
    let state = Arc::new(AppState::new(dao, configs));

    let sync_listener = TcpListener::bind(cli.sync_addr)
        .await
        .with_context(|| format!("binding sync listener on {}", cli.sync_addr))?;
    tracing::info!(addr = %cli.sync_addr, "sync listener bound");

    let admin_listener = TcpListener::bind(cli.admin_addr)
        .await
        .with_context(|| format!("binding admin listener on {}", cli.admin_addr))?;
    tracing::info!(addr = %cli.admin_addr, "admin listener bound");

    let sync_state = state.clone();
    let sync_task = tokio::spawn(async move { run_sync_listener(sync_listener, sync_state).await });

    let admin_router = admin::router(state);
    let admin_task = tokio::spawn(async move {
        axum::serve(admin_listener, admin_router)
            .await
            .context("admin HTTP server failed")
    });

    tokio::select! {
        result = sync_task => result.context("sync listener task panicked")??,
        result = admin_task => result.context("admin server task panicked")??,
    }

    Ok(())
}

/// Accept loop for the sync TCP listener: one spawned task per connection,
/// each independently authenticating and then driving its own full-sync
/// operation loop (§4.9, [`connection::handle_connection`]).
async fn run_sync_listener(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accepting sync connection")?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        let state = state.clone();
        tokio::spawn(async move { connection::handle_connection(stream, state).await });
    }
}
