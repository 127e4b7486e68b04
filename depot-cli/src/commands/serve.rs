//! HTTP server command
//!
//! Starts the repository (readiness wait plus migrations when enabled), serves the
//! item API until Ctrl+C or SIGTERM, then stops the repository.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use depot_repo::Repository;
use depot_server::{run_server, ServerConfig};

use crate::config::DepotConfig;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: [app] host and port from the config)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: &DepotConfig) -> Result<()> {
    let bind_addr = match args.bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };

    let mut repo = Repository::new(config.to_repository_settings());
    repo.start()
        .await
        .context("Failed to start repository")?;
    let repo = Arc::new(repo);

    tracing::info!("Starting depot server on {}", bind_addr);
    let server_config = ServerConfig {
        bind_addr,
        cors_permissive: args.cors_permissive,
    };
    let served = run_server(repo.clone(), server_config).await;

    match Arc::into_inner(repo) {
        Some(mut repo) => repo.stop().await.context("Failed to stop repository")?,
        None => tracing::warn!("repository still shared after shutdown, pool left to drop"),
    }

    served.context("Server error")?;
    Ok(())
}
