//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the resilience executor with one command per upstream
//! - Build the handler chain in configuration order
//! - Start the revocation refresher when enabled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Every upstream gets its own circuit and bulkhead
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{MetricsSink, ProxyMetricKeys};
use crate::resilience::{CommandExecutor, CommandSettings};
use crate::revocation::{RefreshError, RevocationRefresher, RevocationStore};
use crate::routing::HandlerChain;
use crate::tokeninfo::proxy::{HttpUpstream, ProxyHandler, Upstream, UpstreamError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("upstream {name:?}: {source}")]
    Upstream {
        name: String,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Revocation(#[from] RefreshError),
}

/// Request-path components built from the configuration.
pub struct Gateway {
    pub chain: HandlerChain,
    pub executor: Arc<CommandExecutor>,
}

/// Assemble handlers for every configured upstream.
pub fn build_gateway(
    config: &GatewayConfig,
    upstream: Arc<dyn Upstream>,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Gateway, StartupError> {
    let settings = CommandSettings::from(&config.resilience);
    let executor = Arc::new(CommandExecutor::new(settings.clone()));
    let keys = Arc::new(ProxyMetricKeys::new(&config.observability.metrics_prefix));

    let mut chain = HandlerChain::new();
    for upstream_config in &config.upstreams {
        executor.configure(&upstream_config.name, &settings);
        let handler = ProxyHandler::new(
            upstream_config,
            upstream.clone(),
            executor.clone(),
            metrics.clone(),
            keys.clone(),
        )
        .map_err(|source| StartupError::Upstream {
            name: upstream_config.name.clone(),
            source,
        })?;
        chain.register(Arc::new(handler));
    }

    tracing::info!(handlers = chain.len(), "Handler chain built");
    Ok(Gateway { chain, executor })
}

/// [`build_gateway`] with the pooled HTTP client.
pub fn build_http_gateway(
    config: &GatewayConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Gateway, StartupError> {
    build_gateway(config, Arc::new(HttpUpstream::new()), metrics)
}

/// Spawn the revocation refresher if it is enabled.
///
/// `store` is only filled here; revocation lookups are served by whoever
/// holds a clone of it, which is outside this binary.
pub fn start_revocation_refresher(
    config: &GatewayConfig,
    store: RevocationStore,
    metrics: Arc<dyn MetricsSink>,
    shutdown: &Shutdown,
) -> Result<Option<JoinHandle<()>>, StartupError> {
    if !config.revocation.enabled {
        tracing::info!("Revocation refresh disabled");
        return Ok(None);
    }

    let refresher = RevocationRefresher::new(&config.revocation, store, metrics)?;
    Ok(Some(tokio::spawn(refresher.run(shutdown.subscribe()))))
}
