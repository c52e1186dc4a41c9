//! HTTP front end: the tool API plus the built single-page application.
//!
//! ```text
//! request ─▶ Trace ─▶ Compression ─▶ Cache-Control ─┬─▶ /api/* ─▶ rate limit ─▶ handler
//!                                                   └─▶ static file (SPA fallback: index.html)
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod logs;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let config = state.config();

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/tools", get(routes::list_tools))
        .route("/tools/:slug", post(routes::run_tool))
        .route("/log", get(routes::recent_logs).post(routes::append_log))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit,
        ));

    let spa = ServeDir::new(&config.static_dir)
        .fallback(ServeFile::new(config.static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .fallback_service(spa)
        .layer(middleware::from_fn(cache::apply))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = state.config().addr();
    spawn_sweeper(state.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("pagesmith server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodically forget idle clients so the limiter map stays bounded.
fn spawn_sweeper(state: AppState) {
    let period = state.config().rate_limit_window.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let dropped = state.rate_limiter().sweep();
            if dropped > 0 {
                tracing::debug!(dropped, "rate limiter sweep");
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
