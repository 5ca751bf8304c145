//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. Validation is a pure
//! function that reports every problem it finds, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, upstream) in config.upstreams.iter().enumerate() {
        let field = |name: &str| format!("upstreams[{}].{}", i, name);

        if upstream.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate upstream name {:?}", upstream.name),
            ));
        }

        match Url::parse(&upstream.url) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(ValidationError::new(
                        field("url"),
                        format!("unsupported scheme {:?}, expected http", url.scheme()),
                    ));
                }
                if url.host_str().is_none() {
                    errors.push(ValidationError::new(field("url"), "missing host"));
                }
            }
            Err(e) => errors.push(ValidationError::new(field("url"), e.to_string())),
        }

        if upstream.cache_ttl_secs > 0 && upstream.cache_max_size == 0 {
            errors.push(ValidationError::new(
                field("cache_max_size"),
                "must be greater than 0 when caching is enabled",
            ));
        }
    }

    let resilience = &config.resilience;
    if resilience.timeout_ms == 0 {
        errors.push(ValidationError::new("resilience.timeout_ms", "must be greater than 0"));
    }
    if resilience.max_concurrent_requests == 0 {
        errors.push(ValidationError::new(
            "resilience.max_concurrent_requests",
            "must be greater than 0",
        ));
    }
    if !(1..=100).contains(&resilience.error_percent_threshold) {
        errors.push(ValidationError::new(
            "resilience.error_percent_threshold",
            "must be between 1 and 100",
        ));
    }
    if resilience.half_open_max_calls == 0 {
        errors.push(ValidationError::new(
            "resilience.half_open_max_calls",
            "must be greater than 0",
        ));
    }
    if resilience.rolling_window_buckets == 0 {
        errors.push(ValidationError::new(
            "resilience.rolling_window_buckets",
            "must be greater than 0",
        ));
    } else if resilience.rolling_window_secs == 0
        || (resilience.rolling_window_secs * 1000) % u64::from(resilience.rolling_window_buckets) != 0
    {
        errors.push(ValidationError::new(
            "resilience.rolling_window_secs",
            "must be non-zero and divisible into rolling_window_buckets whole milliseconds",
        ));
    }

    if config.revocation.enabled {
        if config.revocation.provider_url.is_empty() {
            errors.push(ValidationError::new(
                "revocation.provider_url",
                "required when revocation is enabled",
            ));
        } else if let Err(e) = Url::parse(&config.revocation.provider_url) {
            errors.push(ValidationError::new("revocation.provider_url", e.to_string()));
        }
        if config.revocation.refresh_interval_secs == 0 {
            errors.push(ValidationError::new(
                "revocation.refresh_interval_secs",
                "must be greater than 0",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
