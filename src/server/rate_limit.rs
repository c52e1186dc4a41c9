//! Sliding-window rate limiting per client IP.
//!
//! One [`RateLimiter`] is created at startup and shared through
//! [`AppState`]. Each client keeps a queue of request instants; entries older
//! than the window are dropped lazily when that client is next seen.

use super::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `client` now.
    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Record a request from `client` at `now`.
    ///
    /// Rejected requests are not recorded, so a client that backs off
    /// recovers once its oldest accepted request leaves the window.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut hits = self.hits.lock();
        let queue = hits.entry(client).or_default();
        while queue
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max {
            let oldest = queue.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return Decision::Limited { retry_after };
        }

        queue.push_back(now);
        Decision::Allowed {
            remaining: self.max - queue.len(),
        }
    }

    /// Drop clients with no request inside the window. Returns how many.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let before = hits.len();
        hits.retain(|_, queue| {
            queue
                .back()
                .is_some_and(|&t| now.saturating_duration_since(t) < self.window)
        });
        before - hits.len()
    }

    /// Forget every client.
    pub fn reset(&self) {
        self.hits.lock().clear();
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().len()
    }
}

/// Best-effort client address: the socket peer, then the first
/// `X-Forwarded-For` hop, then `0.0.0.0`.
pub fn client_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> IpAddr {
    if let Some(addr) = peer {
        return addr.ip();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware: 429 with `Retry-After` once a client exceeds the limit.
pub async fn limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(peer, request.headers());

    match state.rate_limiter().check(ip) {
        Decision::Allowed { remaining } => {
            debug!(%ip, remaining, "rate limit ok");
            next.run(request).await
        }
        Decision::Limited { retry_after } => {
            let secs = retry_after.as_secs().max(1);
            warn!(%ip, retry_after = secs, "rate limited");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests, please try again later.",
                    "retryAfter": secs,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn allows_max_then_limits() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed { remaining: 0 });
        assert!(matches!(
            limiter.check_at(ip(1), now),
            Decision::Limited { .. }
        ));
        // Other clients are unaffected.
        assert!(matches!(
            limiter.check_at(ip(2), now),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn recovers_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(matches!(limiter.check_at(ip(1), start), Decision::Allowed { .. }));
        match limiter.check_at(ip(1), start + Duration::from_secs(4)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(6)),
            other => panic!("expected limit, got {other:?}"),
        }
        assert!(matches!(
            limiter.check_at(ip(1), start + Duration::from_secs(10)),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn reset_clears_state() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check(ip(1));
        assert!(matches!(limiter.check(ip(1)), Decision::Limited { .. }));
        limiter.reset();
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(matches!(limiter.check(ip(1)), Decision::Allowed { .. }));
    }

    #[test]
    fn sweep_keeps_active_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.check(ip(1));
        assert_eq!(limiter.sweep(), 0);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_ip_prefers_peer_then_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        assert_eq!(client_ip(Some(peer), &headers), peer.ip());
        assert_eq!(
            client_ip(None, &headers),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            client_ip(None, &HeaderMap::new()),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }
}
