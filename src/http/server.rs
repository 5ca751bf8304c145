//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router dispatching every method/path to the handler chain
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve with connect info so handlers can see the peer address
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::routing::HandlerChain;

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    pub fn new(config: GatewayConfig, chain: HandlerChain) -> Self {
        if chain.is_empty() {
            tracing::warn!("No token-info handlers registered, every request will be rejected");
        }
        let router = Self::build_router(&config, Arc::new(chain));
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, chain: Arc<HandlerChain>) -> Router {
        Router::new()
            .route("/{*path}", any(tokeninfo_handler))
            .route("/", any(tokeninfo_handler))
            .with_state(chain)
            .layer(
                // Outermost first: the request id exists before the trace span opens.
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(config.timeouts.max_body_size))
                    // Needs a `Default` response body, so it sits inside the body limit.
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn tokeninfo_handler(State(chain): State<Arc<HandlerChain>>, request: Request<Body>) -> Response {
    chain.dispatch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_middleware_stack_serves_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(GatewayConfig::default(), HandlerChain::new());
        let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

        let response = reqwest::Client::new()
            .get(format!("http://{}/oauth2/tokeninfo", addr))
            .bearer_auth("opaque")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key("x-request-id"));

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }
}
