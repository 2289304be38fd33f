//! Forwarding proxy (HTTP relay + CONNECT tunnels).
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  FORWARDING PROXY                    │
//!                      │                                                      │
//!   Client request     │  ┌──────────┐    ┌────────────┐   CONNECT            │
//!   ───────────────────┼─▶│   net    │───▶│ dispatcher │──────────┐           │
//!                      │  │ listener │    │ (head read)│          ▼           │
//!                      │  └──────────┘    └─────┬──────┘   ┌─────────────┐    │
//!                      │                        │ other    │   tunnel    │◀───┼──▶ Origin
//!                      │                        ▼          │ (raw bytes) │    │    (TCP)
//!                      │               ┌────────────────┐  └─────────────┘    │
//!                      │               │ hyper + axum   │                     │
//!                      │               │ header sanitize│                     │
//!                      │               │  HTTP relay    │◀────────────────────┼──▶ Origin
//!                      │               └────────────────┘                     │    (HTTP)
//!                      │                                                      │
//!                      │   crypto: XOR transform on the client leg (optional) │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use obfs_forward_proxy::cli::Cli;
use obfs_forward_proxy::lifecycle::{signals, startup, Shutdown};
use obfs_forward_proxy::net::Listener;
use obfs_forward_proxy::observability::init_logging;
use obfs_forward_proxy::ProxyServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_logging(&config.observability);
    tracing::info!("obfs-forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let key = match startup::resolve_key(&config.obfuscation) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "Failed to prepare secret key");
            return Err(e.into());
        }
    };
    startup::log_startup(&config, key.as_deref());

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    let server = ProxyServer::new(config, key);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
