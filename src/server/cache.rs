//! Tiered `Cache-Control` headers.

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use regex::Regex;

pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const WORKER: &str = "public, max-age=604800";
pub const HTML: &str = "public, max-age=3600";
pub const API: &str = "public, max-age=300";

/// Bundler output such as `index-4f3a9c1b.js` or `app.8e2d0c7a.css`.
static FINGERPRINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.-]([A-Za-z0-9_]{8,})\.(?:m?js|css|woff2?|ttf|png|jpe?g|gif|svg|webp|avif|ico)$")
        .unwrap()
});

/// The `Cache-Control` value for a request path, if any.
pub fn policy_for(path: &str) -> Option<&'static str> {
    if path == "/api" || path.starts_with("/api/") {
        return Some(API);
    }

    let file = path.rsplit('/').next().unwrap_or(path);
    if file.contains("worker") && (file.ends_with(".js") || file.ends_with(".mjs")) {
        return Some(WORKER);
    }
    if let Some(caps) = FINGERPRINT.captures(file) {
        if caps[1].bytes().any(|b| b.is_ascii_digit()) {
            return Some(IMMUTABLE);
        }
    }
    // SPA routes have no extension and are answered with index.html.
    if file.is_empty() || file.ends_with(".html") || !file.contains('.') {
        return Some(HTML);
    }
    None
}

/// Middleware: set `Cache-Control` unless the handler already did.
pub async fn apply(request: Request, next: Next) -> Response {
    let policy = policy_for(request.uri().path());
    let mut response = next.run(request).await;
    if let Some(value) = policy {
        response
            .headers_mut()
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers() {
        assert_eq!(policy_for("/assets/index-4f3a9c1b.js"), Some(IMMUTABLE));
        assert_eq!(policy_for("/assets/app.8e2d0c7a.css"), Some(IMMUTABLE));
        assert_eq!(policy_for("/pdf.worker.min.mjs"), Some(WORKER));
        assert_eq!(policy_for("/sw-worker.js"), Some(WORKER));
        assert_eq!(policy_for("/"), Some(HTML));
        assert_eq!(policy_for("/index.html"), Some(HTML));
        assert_eq!(policy_for("/merge-pdf"), Some(HTML));
        assert_eq!(policy_for("/api/health"), Some(API));
    }

    #[test]
    fn plain_assets_get_no_policy() {
        assert_eq!(policy_for("/favicon.ico"), None);
        assert_eq!(policy_for("/images/my-longname.png"), None);
    }
}
