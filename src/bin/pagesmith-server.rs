//! pagesmith HTTP server.
//!
//! Serves the built single-page application from `STATIC_DIR` and the tool
//! API under `/api`. Configuration comes from the environment (and `.env`).

use anyhow::{Context, Result};
use pagesmith::server::{self, AppState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesmith=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!("Starting pagesmith server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Static files: {}", config.static_dir.display());
    tracing::info!(
        "Rate limit: {} requests per {}s",
        config.rate_limit_max,
        config.rate_limit_window.as_secs()
    );
    if !config.static_dir.join("index.html").exists() {
        tracing::warn!(
            "{} has no index.html; only the API will be useful",
            config.static_dir.display()
        );
    }

    let state = AppState::connect(config)
        .await
        .context("Failed to open processing-log database")?;
    match state.config().database_url.as_deref() {
        Some(url) => tracing::info!("Processing log at {}", url),
        None => tracing::info!("Processing log disabled (DATABASE_URL unset)"),
    }

    server::serve(state).await.context("Server error")?;
    Ok(())
}
