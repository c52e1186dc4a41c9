//! `GET /api/health`

use super::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::atomic::Ordering;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Seconds since startup.
    pub uptime: u64,
    pub memory: MemoryUsage,
    pub performance: Performance,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident set size in bytes, when the platform reports it.
    pub rss_bytes: Option<u64>,
    pub virtual_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub processed: u64,
    pub failed: u64,
    pub average_processing_ms: u64,
    pub rate_limited_clients: usize,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let counters = state.counters();
    let processed = counters.processed.load(Ordering::Relaxed);
    let failed = counters.failed.load(Ordering::Relaxed);
    let total_ms = counters.total_processing_ms.load(Ordering::Relaxed);
    let runs = processed + failed;

    Json(HealthResponse {
        status: "healthy",
        uptime: state.started().elapsed().as_secs(),
        memory: memory_usage(),
        performance: Performance {
            processed,
            failed,
            average_processing_ms: if runs == 0 { 0 } else { total_ms / runs },
            rate_limited_clients: state.rate_limiter().tracked_clients(),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

/// Read `/proc/self/statm` (pages) where available.
fn memory_usage() -> MemoryUsage {
    const PAGE_SIZE: u64 = 4096;
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return MemoryUsage::default();
    };
    let mut fields = statm.split_whitespace().map(|f| f.parse::<u64>().ok());
    let virtual_pages = fields.next().flatten();
    let resident_pages = fields.next().flatten();
    MemoryUsage {
        rss_bytes: resident_pages.map(|p| p * PAGE_SIZE),
        virtual_bytes: virtual_pages.map(|p| p * PAGE_SIZE),
    }
}
