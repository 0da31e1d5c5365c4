//! voxscreen-gateway - local proxy to the voice inference service
//!
//! Accepts audio uploads and manual feature vectors from voxscreen clients
//! and forwards them to the external model service.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxscreen_common::config::load_config;
use voxscreen_gateway::upstream::InferenceClient;
use voxscreen_gateway::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "voxscreen-gateway", version, about = "Proxy to the voice inference service")]
struct Args {
    /// Configuration file (overrides VOXSCREEN_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long, env = "VOXSCREEN_GATEWAY_PORT")]
    port: Option<u16>,

    /// Inference service base URL
    #[arg(long, env = "VOXSCREEN_UPSTREAM_URL")]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting voxscreen-gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(host) = args.host {
        config.gateway.host = host;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(upstream) = args.upstream {
        config.gateway.upstream_url = upstream;
    }

    let upstream = InferenceClient::new(
        &config.gateway.upstream_url,
        Duration::from_secs(config.gateway.upstream_timeout_secs),
    )?;
    info!("Inference service: {}", upstream.base_url());

    let state = AppState::new(upstream);
    let app = build_router(state);

    let address = config.gateway.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("voxscreen-gateway listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
