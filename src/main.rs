use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nutrack_server::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== NutriTrack Server Starting ===");
    if config.debug {
        tracing::warn!("DEBUG mode is on - OTP codes are echoed in responses");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let context = nutrack_server::build_context(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening for HTTP connections");

    nutrack_server::run_server(context, listener).await
}
