//! Matchroom lobby server binary.

mod cli;
mod config;

use anyhow::Context;
use clap::Parser;
use matchroom::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&config.logging.level)?;
    if !cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
    }

    let server = MatchroomServer::builder()
        .bind(&config.server.bind_address)
        .lobby_config(config.lobby.clone())
        .handshake_timeout(config.server.handshake_timeout())
        .idle_timeout(config.server.idle_timeout())
        .build()
        .await
        .context("failed to start server")?;

    tracing::info!(
        addr = %server.local_addr()?,
        max_players = config.lobby.max_players,
        "listening"
    );

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .context("failed to install logger")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
