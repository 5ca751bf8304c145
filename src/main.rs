//! Token-info gateway.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                  TOKENINFO GATEWAY                    │
//!   Client        │  ┌────────┐   ┌─────────────┐   ┌─────────────────┐  │
//!   ─────────────────▶│  http  │──▶│ HandlerChain│──▶│  ProxyHandler   │  │
//!                 │  │ server │   │ (matchers)  │   │  ┌───────────┐  │  │
//!                 │  └────────┘   └─────────────┘   │  │ TTL cache │  │  │
//!                 │                                 │  └─────┬─────┘  │  │
//!                 │                                 │        ▼ miss   │  │
//!                 │                                 │  ┌───────────┐  │  │    Upstream
//!                 │                                 │  │ executor  │──────────▶ tokeninfo
//!                 │                                 │  └───────────┘  │  │
//!                 │                                 └─────────────────┘  │
//!                 │  ┌────────────────────┐   ┌──────────────────────┐   │
//!   Revocation ──────▶│ refresher → ingest │──▶│ RevocationStore      │   │
//!   provider      │  └────────────────────┘   └──────────────────────┘   │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use tokeninfo_gateway::config::{load_config, GatewayConfig};
use tokeninfo_gateway::lifecycle::{self, signals, Shutdown};
use tokeninfo_gateway::observability::{logging, metrics, MetricsSink, PrometheusSink};
use tokeninfo_gateway::revocation::RevocationStore;
use tokeninfo_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "tokeninfo-gateway")]
#[command(about = "Caching, circuit-protected token-info proxy", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tokeninfo-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        request_timeout_secs = config.timeouts.request_secs,
        revocation_enabled = config.revocation.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
    let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink);

    let gateway = lifecycle::build_http_gateway(&config, sink.clone())?;

    let shutdown = Shutdown::new();
    let revocations = RevocationStore::new();
    let refresher = lifecycle::start_revocation_refresher(&config, revocations, sink, &shutdown)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, gateway.chain);
    server.run(listener, shutdown.subscribe()).await?;

    // Make sure background tasks stop even if the server exited on its own.
    shutdown.trigger();
    if let Some(handle) = refresher {
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
