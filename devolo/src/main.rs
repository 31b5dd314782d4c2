mod server;

use anyhow::Result;
use tracing::info;

use devolo_api::AppState;
use devolo_core::{bootstrap::load_config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("DEVOLO API server starting...");
    info!("HTTP address: {}", config.http_address());
    info!(
        upstream = %config.hls.upstream_base_url,
        timeout_seconds = config.hls.timeout_seconds,
        "HLS proxy upstream configured"
    );

    // 3. Build shared state
    let state = AppState::from_config(&config)?;

    // 4. Serve until Ctrl+C / SIGTERM
    server::run(&config, state).await?;

    info!("DEVOLO API server stopped");
    Ok(())
}
