//! Lookup configuration, loaded once at process start.
//!
//! Provider credentials live here and are handed to adapters at construction.
//! Swapping them at runtime goes through `Orchestrator::replace_providers`.

use std::fmt;
use std::time::Duration;

use crate::http::{ExecutorConfig, DEFAULT_MAX_RETRIES};
use crate::provider::ProviderSource;

/// Asynchronous, protocol-based gateway provider.
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Synchronous provider answering in the same call.
#[derive(Clone)]
pub struct DirectConfig {
    pub base_url: String,
    pub api_key: String,
}

impl fmt::Debug for DirectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Polling Coordinator timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    /// Upper bound for one watch loop, matching the provider's own job budget.
    pub max_duration: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_duration: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub gateway: Option<GatewayConfig>,
    pub direct: Option<DirectConfig>,
    /// Fallback order when several providers serve a search type.
    pub provider_order: Vec<ProviderSource>,
    pub max_retries: u32,
    /// Deadline for each outbound attempt.
    pub request_timeout: Duration,
    pub executor: ExecutorConfig,
    pub polling: PollingConfig,
    /// Substitute synthetic results for provider failures. Never on by default.
    pub demo_mode: bool,
    /// Status polls the demo provider reports `processing` before it is ready.
    pub demo_latency_polls: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            gateway: None,
            direct: None,
            provider_order: vec![ProviderSource::Gateway, ProviderSource::Direct],
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(15),
            executor: ExecutorConfig::default(),
            polling: PollingConfig::default(),
            demo_mode: false,
            demo_latency_polls: 1,
        }
    }
}

impl LookupConfig {
    /// Load configuration from environment variables.
    ///
    /// Providers are configured when both their URL and credential are set:
    /// `RADAR_GATEWAY_URL` + `RADAR_GATEWAY_TOKEN`, `RADAR_DIRECT_URL` +
    /// `RADAR_DIRECT_API_KEY`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let gateway = match (env("RADAR_GATEWAY_URL"), env("RADAR_GATEWAY_TOKEN")) {
            (Some(base_url), Some(token)) => Some(GatewayConfig { base_url, token }),
            _ => None,
        };

        let direct = match (env("RADAR_DIRECT_URL"), env("RADAR_DIRECT_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(DirectConfig { base_url, api_key }),
            _ => None,
        };

        let provider_order = env("RADAR_PROVIDER_ORDER")
            .map(|raw| parse_provider_order(&raw))
            .filter(|order| !order.is_empty())
            .unwrap_or(defaults.provider_order);

        let executor = ExecutorConfig {
            base_delay: env_parse("RADAR_BACKOFF_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.executor.base_delay),
            max_delay: env_parse("RADAR_BACKOFF_CAP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.executor.max_delay),
            https_only: env("RADAR_HTTPS_ONLY")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.executor.https_only),
            ..defaults.executor
        };

        let polling = PollingConfig {
            interval: env_parse::<u64>("RADAR_POLL_INTERVAL_SECS")
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.polling.interval),
            max_duration: env_parse("RADAR_POLL_MAX_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.polling.max_duration),
        };

        Self {
            gateway,
            direct,
            provider_order,
            max_retries: env_parse("RADAR_MAX_RETRIES").unwrap_or(defaults.max_retries),
            request_timeout: env_parse("RADAR_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            executor,
            polling,
            demo_mode: env("RADAR_DEMO_MODE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            demo_latency_polls: env_parse("RADAR_DEMO_LATENCY_POLLS")
                .unwrap_or(defaults.demo_latency_polls),
        }
    }

    /// Whether any real provider is configured.
    pub fn has_real_provider(&self) -> bool {
        self.gateway.is_some() || self.direct.is_some()
    }
}

/// Webhook Dispatch Engine settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Retries per delivery. Delivery is best-effort, so lower than lookups.
    pub max_retries: u32,
    /// Deadline for each delivery attempt.
    pub timeout: Duration,
    pub executor: ExecutorConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            timeout: Duration::from_secs(10),
            executor: ExecutorConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// `RADAR_WEBHOOK_MAX_RETRIES`, `RADAR_WEBHOOK_TIMEOUT_SECS`,
    /// `RADAR_WEBHOOK_ALLOW_HTTP`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let allow_http = env("RADAR_WEBHOOK_ALLOW_HTTP")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            max_retries: env_parse("RADAR_WEBHOOK_MAX_RETRIES").unwrap_or(defaults.max_retries),
            timeout: env_parse("RADAR_WEBHOOK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            executor: ExecutorConfig {
                https_only: !allow_http,
                ..defaults.executor
            },
        }
    }
}

/// Comma-separated provider names; unknown names are logged and skipped.
pub fn parse_provider_order(raw: &str) -> Vec<ProviderSource> {
    let mut order = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<ProviderSource>() {
            Ok(source) if !order.contains(&source) => order.push(source),
            Ok(_) => {}
            Err(_) => tracing::warn!(provider = name, "Ignoring unknown provider in RADAR_PROVIDER_ORDER"),
        }
    }
    order
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LookupConfig::default();
        assert!(!config.demo_mode);
        assert!(!config.has_real_provider());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.polling.max_duration, Duration::from_secs(600));

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.max_retries, 1);
        assert!(dispatch.max_retries < config.max_retries);
        assert!(dispatch.executor.https_only);
    }

    #[test]
    fn test_zero_poll_interval_is_ignored() {
        std::env::set_var("RADAR_POLL_INTERVAL_SECS", "0");
        let config = LookupConfig::from_env();
        std::env::remove_var("RADAR_POLL_INTERVAL_SECS");
        assert_eq!(config.polling.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_provider_order_parsing() {
        assert_eq!(
            parse_provider_order("direct, gateway,direct,bogus"),
            vec![ProviderSource::Direct, ProviderSource::Gateway]
        );
        assert!(parse_provider_order(" , ").is_empty());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let gateway = GatewayConfig {
            base_url: "https://gateway.example".into(),
            token: "super-secret".into(),
        };
        let debug = format!("{gateway:?}");
        assert!(debug.contains("gateway.example"));
        assert!(!debug.contains("super-secret"));

        let direct = DirectConfig {
            base_url: "https://direct.example".into(),
            api_key: "key-123".into(),
        };
        assert!(!format!("{direct:?}").contains("key-123"));
    }
}
