//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the token-info gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request-level timeouts and limits.
    pub timeouts: TimeoutConfig,

    /// Upstream token-info servers, in match order.
    pub upstreams: Vec<UpstreamConfig>,

    /// Circuit breaker, bulkhead and timeout settings for upstream calls.
    pub resilience: ResilienceConfig,

    /// Revocation feed settings.
    pub revocation: RevocationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9021").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9021".to_string(),
        }
    }
}

/// Timeouts applied to every inbound request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            max_body_size: 64 * 1024,
        }
    }
}

/// One upstream token-info server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Name used for logging and as the resilience command name.
    #[serde(default = "default_upstream_name")]
    pub name: String,

    /// Full URL of the upstream token-info endpoint.
    pub url: String,

    /// Cache lifetime for successful responses. 0 disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached tokens.
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Only handle tokens shaped like a lowercase UUID.
    #[serde(default)]
    pub uuid_tokens_only: bool,
}

impl UpstreamConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_size: default_cache_max_size(),
            uuid_tokens_only: false,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_upstream_name() -> String {
    "proxy".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_cache_max_size() -> usize {
    10_000
}

/// Resilience settings for upstream commands.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Deadline for a single upstream call in milliseconds.
    pub timeout_ms: u64,

    /// Maximum in-flight calls per command (bulkhead).
    pub max_concurrent_requests: usize,

    /// Minimum calls in the rolling window before the circuit may open.
    pub request_volume_threshold: u64,

    /// Error percentage (1-100) that opens the circuit.
    pub error_percent_threshold: u8,

    /// Cool-down before an open circuit lets trial calls through.
    pub sleep_window_ms: u64,

    /// Length of the rolling statistics window in seconds.
    pub rolling_window_secs: u64,

    /// Number of buckets the rolling window is split into.
    pub rolling_window_buckets: u32,

    /// Trial calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl ResilienceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sleep_window(&self) -> Duration {
        Duration::from_millis(self.sleep_window_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_secs(self.rolling_window_secs)
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            max_concurrent_requests: 100,
            request_volume_threshold: 20,
            error_percent_threshold: 50,
            sleep_window_ms: 5_000,
            rolling_window_secs: 10,
            rolling_window_buckets: 10,
            half_open_max_calls: 1,
        }
    }
}

/// Revocation provider polling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Enable the periodic feed refresh.
    pub enabled: bool,

    /// Revocation provider URL.
    pub provider_url: String,

    /// Seconds between refreshes.
    pub refresh_interval_secs: u64,

    /// Provider request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_url: String::new(),
            refresh_interval_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format (pretty, json).
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Prefix for proxy metric keys.
    pub metrics_prefix: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9020".to_string(),
            metrics_prefix: "tokeninfo.proxy".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[upstreams]]
            url = "http://127.0.0.1:9000/oauth2/tokeninfo"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9021");
        assert_eq!(config.upstreams.len(), 1);
        assert_eq!(config.upstreams[0].name, "proxy");
        assert_eq!(config.upstreams[0].cache_ttl(), Duration::from_secs(60));
        assert!(!config.upstreams[0].uuid_tokens_only);
        assert_eq!(config.resilience.timeout(), Duration::from_secs(2));
        assert!(!config.revocation.enabled);
        assert_eq!(config.observability.metrics_prefix, "tokeninfo.proxy");
    }

    #[test]
    fn test_full_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [[upstreams]]
            name = "uuid"
            url = "http://legacy:8080/tokeninfo"
            cache_ttl_secs = 0
            uuid_tokens_only = true

            [[upstreams]]
            name = "jwt"
            url = "http://modern:8080/tokeninfo"

            [resilience]
            timeout_ms = 500
            max_concurrent_requests = 8

            [revocation]
            enabled = true
            provider_url = "http://revocations:8080/api/revocations"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstreams[0].name, "uuid");
        assert_eq!(config.upstreams[0].cache_ttl_secs, 0);
        assert!(config.upstreams[0].uuid_tokens_only);
        assert_eq!(config.upstreams[1].name, "jwt");
        assert_eq!(config.resilience.max_concurrent_requests, 8);
        assert_eq!(config.resilience.error_percent_threshold, 50);
        assert!(config.revocation.enabled);
    }
}
