//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Lookup and webhook settings live in `radar_core` and are loaded alongside.

use std::net::SocketAddr;
use std::time::Duration;

use radar_core::{DispatchConfig, LookupConfig};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 1)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL. In-memory storage is used when unset.
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
    /// Running consultations older than this are timed out (default: 24h)
    pub stale_after: Duration,
    /// How often the expiry sweep runs (default: 5 min)
    pub sweep_interval: Duration,
    pub lookup: LookupConfig,
    pub dispatch: DispatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 1,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            database_min_connections: 2,
            stale_after: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            lookup: LookupConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC").unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            database_min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                .unwrap_or(defaults.database_min_connections),
            stale_after: env_secs("STALE_AFTER_SECS").unwrap_or(defaults.stale_after),
            sweep_interval: env_secs("SWEEP_INTERVAL_SECS").unwrap_or(defaults.sweep_interval),
            lookup: LookupConfig::from_env(),
            dispatch: DispatchConfig::from_env(),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// A non-zero number of seconds; zero is treated as unset.
fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key)
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.rate_limit_enabled);
        assert!(!config.lookup.demo_mode);
        assert_eq!(config.stale_after, Duration::from_secs(86_400));
    }

    #[test]
    fn test_zero_seconds_falls_back_to_default() {
        std::env::set_var("RADAR_TEST_ZERO_SECS", "0");
        std::env::set_var("RADAR_TEST_SOME_SECS", " 30 ");
        assert_eq!(env_secs("RADAR_TEST_ZERO_SECS"), None);
        assert_eq!(env_secs("RADAR_TEST_SOME_SECS"), Some(Duration::from_secs(30)));
        assert_eq!(env_secs("RADAR_TEST_UNSET_SECS"), None);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            host: [0, 0, 0, 0],
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }
}
