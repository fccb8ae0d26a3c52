//! ragd - retrieval-augmented answer daemon

use anyhow::Result;
use ragd::config::Config;
use ragd::server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("ragd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    // Collaborators are built on first request; only warn here
    let missing = config.missing_settings();
    if !missing.is_empty() {
        warn!("Missing settings, answers will fail until set: {}", missing.join(", "));
    }
    info!(
        "Config: top_k={}, api_prefix={}",
        config.pipeline.top_k, config.server.api_prefix
    );

    server::run(config).await?;

    info!("ragd stopped");
    Ok(())
}
