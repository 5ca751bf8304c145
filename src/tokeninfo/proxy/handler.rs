//! Caching, circuit-protected proxy to an upstream token-info server.
//!
//! # Request Flow
//! ```text
//! no token            → 400 invalid_request
//! cache hit           → cached body, X-Cache: HIT
//! cache expired/miss  → executor("<command>", forward)
//!     ok              → upstream response read in full, X-Cache: MISS
//!     timeout         → 504 (also while the body is still arriving)
//!     bulkhead full   → 429
//!     circuit open    → 502
//!     transport error → 502 (connect failure, broken or oversized body)
//!     anything else   → 500
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use hyper::body::Bytes;
use tokio::time::Instant;

use crate::cache::{CacheLookup, TtlCache};
use crate::config::UpstreamConfig;
use crate::http::response::{status_text, CACHE_HIT, CACHE_MISS, X_CACHE};
use crate::observability::{MetricsSink, ProxyMetricKeys};
use crate::resilience::{ExecutionError, ResilienceExecutor};
use crate::routing::matcher::{Matcher, UuidTokenMatcher};
use crate::tokeninfo::proxy::upstream::{strip_hop_by_hop, Upstream, UpstreamError, UpstreamTarget};
use crate::tokeninfo::{access_token, TokenInfoError, TokenInfoHandler, JSON_CONTENT_TYPE};

/// Upper bound on an upstream response body.
pub const MAX_UPSTREAM_BODY: usize = 1024 * 1024;

pub struct ProxyHandler<X> {
    command: String,
    target: UpstreamTarget,
    upstream: Arc<dyn Upstream>,
    executor: Arc<X>,
    cache: TtlCache,
    ttl: Duration,
    matcher: UuidTokenMatcher,
    metrics: Arc<dyn MetricsSink>,
    keys: Arc<ProxyMetricKeys>,
}

impl<X: ResilienceExecutor> ProxyHandler<X> {
    pub fn new(
        config: &UpstreamConfig,
        upstream: Arc<dyn Upstream>,
        executor: Arc<X>,
        metrics: Arc<dyn MetricsSink>,
        keys: Arc<ProxyMetricKeys>,
    ) -> Result<Self, UpstreamError> {
        let target = UpstreamTarget::parse(&config.url)?;
        tracing::info!(
            command = %config.name,
            upstream = %config.url,
            cache_ttl_secs = config.cache_ttl_secs,
            cache_max_size = config.cache_max_size,
            uuid_tokens_only = config.uuid_tokens_only,
            "Token-info proxy configured"
        );

        Ok(Self {
            command: config.name.clone(),
            target,
            upstream,
            executor,
            cache: TtlCache::new(config.cache_max_size),
            ttl: config.cache_ttl(),
            matcher: UuidTokenMatcher::new(config.uuid_tokens_only),
            metrics,
            keys,
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    async fn serve(&self, req: Request<Body>) -> Response {
        let Some(token) = access_token(&req) else {
            return TokenInfoError::InvalidRequest.into_response();
        };

        let start = Instant::now();
        match self.cache.lookup(&token) {
            CacheLookup::Hit(body) => {
                self.metrics.increment(&self.keys.cache_hits);
                return cached_response(body);
            }
            CacheLookup::Expired => {
                self.metrics.increment(&self.keys.cache_expirations);
                self.metrics.increment(&self.keys.cache_misses);
            }
            CacheLookup::Miss => {
                self.metrics.increment(&self.keys.cache_misses);
            }
        }

        match self.executor.execute(&self.command, self.forward(token, req)).await {
            Ok(response) => {
                self.metrics.record_duration(&self.keys.request, start.elapsed());
                response
            }
            Err(e) => self.failure_response(e),
        }
    }

    async fn forward(&self, token: String, req: Request<Body>) -> Result<Response, UpstreamError> {
        let upstream_start = Instant::now();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (mut parts, body) = req.into_parts();
        self.target.rewrite(&mut parts, peer)?;

        let response = match self.upstream.send(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "Upstream request failed");
                return Err(e);
            }
        };

        let (mut parts, body) = response.into_parts();
        let body = match axum::body::to_bytes(body, MAX_UPSTREAM_BODY).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "Reading upstream body failed");
                return Err(UpstreamError::Transport(format!("reading response body: {}", e)));
            }
        };
        self.metrics.record_duration(&self.keys.upstream, upstream_start.elapsed());

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(X_CACHE, CACHE_MISS);

        if parts.status == StatusCode::OK && !self.ttl.is_zero() {
            self.cache.insert(token, body.clone(), self.ttl);
        }

        Ok(Response::from_parts(parts, Body::from(body)))
    }

    fn failure_response(&self, error: ExecutionError<UpstreamError>) -> Response {
        let status = match &error {
            ExecutionError::Timeout => {
                self.metrics.increment(&self.keys.upstream_timeouts);
                StatusCode::GATEWAY_TIMEOUT
            }
            ExecutionError::MaxConcurrency => {
                self.metrics.increment(&self.keys.upstream_overruns);
                StatusCode::TOO_MANY_REQUESTS
            }
            ExecutionError::CircuitOpen => {
                self.metrics.increment(&self.keys.upstream_open_requests);
                StatusCode::BAD_GATEWAY
            }
            ExecutionError::Command(UpstreamError::Transport(_)) => {
                self.metrics.increment(&self.keys.upstream_errors);
                StatusCode::BAD_GATEWAY
            }
            ExecutionError::Command(UpstreamError::InvalidTarget(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(
            command = %self.command,
            status = status.as_u16(),
            error = %error,
            "Token-info request not served by upstream"
        );
        status_text(status)
    }
}

impl<X: ResilienceExecutor> TokenInfoHandler for ProxyHandler<X> {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }

    fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(self.serve(req))
    }
}

fn cached_response(body: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE)),
            (X_CACHE, CACHE_HIT),
        ],
        body,
    )
        .into_response()
}
