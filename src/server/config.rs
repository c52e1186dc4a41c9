//! Server configuration, read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A variable was set but could not be parsed.
#[derive(Debug, Error)]
#[error("Invalid value '{value}' for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory holding the built single-page application.
    pub static_dir: PathBuf,
    /// SQLite URL for the processing log; logging is off when unset.
    pub database_url: Option<String>,
    /// Requests allowed per client per window.
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    /// Request body ceiling, covering every file in one upload.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            static_dir: PathBuf::from("dist"),
            database_url: None,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(60),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from process environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let rate_limit_max = positive(
            parse(&lookup, "RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            "RATE_LIMIT_MAX",
        )?;
        let window_secs = positive(
            parse(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window.as_secs())?,
            "RATE_LIMIT_WINDOW_SECS",
        )?;
        let max_upload_mb: usize = positive(
            parse(&lookup, "MAX_UPLOAD_MB", defaults.max_upload_bytes / (1024 * 1024))?,
            "MAX_UPLOAD_MB",
        )?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError {
                key: "MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
            })?;

        Ok(Self {
            host: parse(&lookup, "HOST", defaults.host)?,
            port: parse(&lookup, "PORT", defaults.port)?,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            rate_limit_max,
            rate_limit_window: Duration::from_secs(window_secs),
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError { key, value: raw }),
        None => Ok(default),
    }
}

/// Limits of zero are rejected.
fn positive<T>(value: T, key: &'static str) -> Result<T, ConfigError>
where
    T: Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}
