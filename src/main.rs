//! Chatbridge CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatbridge")]
#[command(about = "Chatfuel ↔ Dify bridge: normalizes and relays model answers")]
struct Cli {
    /// Listen port (overrides the PORT environment variable)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = chatbridge::config::Config::load()
        .with_context(|| "failed to load configuration from environment")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let readiness = config.readiness();
    if readiness.is_full() {
        tracing::info!("configuration complete, all capabilities available");
    } else {
        for key in &readiness.missing {
            tracing::warn!(%key, "environment variable not set");
        }
        tracing::warn!(
            upstream = readiness.upstream,
            delivery = readiness.delivery,
            "running degraded, affected pipeline steps will be skipped"
        );
    }

    let dify = match config.dify_api_key.as_ref() {
        Some(key) => Some(
            chatbridge::dify::DifyClient::new(key.clone())
                .with_context(|| "failed to build Dify client")?,
        ),
        None => None,
    };

    let chatfuel = match (
        config.chatfuel.bot_id.as_ref(),
        config.chatfuel.token.as_ref(),
        config.chatfuel.answer_block_id.as_ref(),
    ) {
        (Some(bot_id), Some(token), Some(block_id)) => Some(
            chatbridge::chatfuel::ChatfuelBroadcaster::new(
                bot_id.clone(),
                token.clone(),
                block_id.clone(),
            )
            .with_context(|| "failed to build Chatfuel broadcaster")?,
        ),
        _ => None,
    };

    let bridge = Arc::new(chatbridge::pipeline::Bridge { dify, chatfuel });

    let bind = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server = chatbridge::server::start_http_server(bind, bridge, shutdown_rx)
        .await
        .with_context(|| format!("failed to start HTTP server on {bind}"))?;

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = server.await;

    tracing::info!("chatbridge stopped");
    Ok(())
}
