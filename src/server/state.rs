//! Shared application state.

use super::config::ServerConfig;
use super::logs::LogStore;
use super::rate_limit::RateLimiter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cheap to clone; every handler gets one.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    rate_limiter: RateLimiter,
    logs: Option<LogStore>,
    started: Instant,
    counters: Counters,
}

/// Request counters reported by `/api/health`.
#[derive(Debug, Default)]
pub struct Counters {
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub total_processing_ms: AtomicU64,
}

impl Counters {
    pub fn record(&self, ok: bool, elapsed_ms: u64) {
        if ok {
            self.processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_processing_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(config: ServerConfig, logs: Option<LogStore>) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                rate_limiter,
                logs,
                started: Instant::now(),
                counters: Counters::default(),
            }),
        }
    }

    /// Connect the processing log when `DATABASE_URL` is configured.
    pub async fn connect(config: ServerConfig) -> Result<Self, sqlx::Error> {
        let logs = match &config.database_url {
            Some(url) => Some(LogStore::connect(url).await?),
            None => None,
        };
        Ok(Self::new(config, logs))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn logs(&self) -> Option<&LogStore> {
        self.inner.logs.as_ref()
    }

    pub fn started(&self) -> Instant {
        self.inner.started
    }

    pub fn counters(&self) -> &Counters {
        &self.inner.counters
    }
}
