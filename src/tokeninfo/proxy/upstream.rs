//! Forwarding to the upstream token-info server.
//!
//! # Request Rewrite
//! - URI becomes upstream scheme + authority + path, with the caller's
//!   query appended to any query the upstream URL already carries
//! - `Host` is set to the upstream authority
//! - Hop-by-hop headers are dropped and the peer joins `X-Forwarded-For`
//! - Method, remaining headers and body pass through untouched

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that only make sense for a single connection.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, reset, DNS failure and the like.
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

/// Something that can carry a request to the upstream.
pub trait Upstream: Send + Sync {
    fn send(&self, req: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>>;
}

/// Upstream over plain HTTP using the pooled hyper client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
}

impl HttpUpstream {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream for HttpUpstream {
    fn send(&self, req: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>> {
        Box::pin(async move {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;
            Ok(response.map(Body::new))
        })
    }
}

/// Where requests are sent, parsed once from the configured URL.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    path: String,
    query: Option<String>,
}

impl UpstreamTarget {
    pub fn parse(url: &str) -> Result<Self, UpstreamError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::InvalidTarget(e.to_string()))?;
        let parts = uri.into_parts();

        let scheme = parts
            .scheme
            .ok_or_else(|| UpstreamError::InvalidTarget(format!("{}: missing scheme", url)))?;
        let authority = parts
            .authority
            .ok_or_else(|| UpstreamError::InvalidTarget(format!("{}: missing authority", url)))?;
        let (path, query) = match parts.path_and_query {
            Some(pq) => (pq.path().to_string(), pq.query().map(str::to_string)),
            None => ("/".to_string(), None),
        };

        Ok(Self {
            scheme,
            authority,
            path,
            query,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Outbound URI for a request that arrived with `query`.
    pub fn uri_for(&self, query: Option<&str>) -> Result<Uri, UpstreamError> {
        let query = match (self.query.as_deref(), query.filter(|q| !q.is_empty())) {
            (Some(a), Some(b)) => Some(format!("{}&{}", a, b)),
            (Some(a), None) => Some(a.to_string()),
            (None, Some(b)) => Some(b.to_string()),
            (None, None) => None,
        };
        let path_and_query = match query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| UpstreamError::InvalidTarget(e.to_string()))
    }

    /// Point `parts` at the upstream.
    pub fn rewrite(&self, parts: &mut request::Parts, peer: Option<SocketAddr>) -> Result<(), UpstreamError> {
        parts.uri = self.uri_for(parts.uri.query())?;

        strip_hop_by_hop(&mut parts.headers);

        let host = HeaderValue::from_str(self.authority.as_str())
            .map_err(|e| UpstreamError::InvalidTarget(e.to_string()))?;
        parts.headers.insert(header::HOST, host);

        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }
        Ok(())
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(uri: &str) -> request::Parts {
        let (parts, _) = Request::builder()
            .uri(uri)
            .header(header::HOST, "gateway.local")
            .header(header::CONNECTION, "keep-alive, x-internal")
            .header("x-internal", "1")
            .header(header::AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_rewrite_uri_and_host() {
        let target = UpstreamTarget::parse("http://auth.example.com:8080/oauth2/tokeninfo").unwrap();
        let mut parts = parts("/anything/else?access_token=abc");

        target.rewrite(&mut parts, None).unwrap();

        assert_eq!(
            parts.uri.to_string(),
            "http://auth.example.com:8080/oauth2/tokeninfo?access_token=abc"
        );
        assert_eq!(parts.headers[header::HOST], "auth.example.com:8080");
        assert_eq!(parts.headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_queries_are_merged() {
        let target = UpstreamTarget::parse("http://auth.example.com/info?realm=/services").unwrap();
        assert_eq!(
            target.uri_for(Some("access_token=abc")).unwrap().to_string(),
            "http://auth.example.com/info?realm=/services&access_token=abc"
        );
        assert_eq!(
            target.uri_for(None).unwrap().to_string(),
            "http://auth.example.com/info?realm=/services"
        );
    }

    #[test]
    fn test_hop_by_hop_headers_removed() {
        let target = UpstreamTarget::parse("http://auth.example.com/info").unwrap();
        let mut parts = parts("/");
        target.rewrite(&mut parts, None).unwrap();

        assert!(parts.headers.get(header::CONNECTION).is_none());
        assert!(parts.headers.get("x-internal").is_none());
    }

    #[test]
    fn test_forwarded_for_appended() {
        let target = UpstreamTarget::parse("http://auth.example.com/info").unwrap();
        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();

        let mut fresh = parts("/");
        target.rewrite(&mut fresh, Some(peer)).unwrap();
        assert_eq!(fresh.headers[X_FORWARDED_FOR], "10.0.0.7");

        let mut chained = parts("/");
        chained.headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("192.0.2.1"));
        target.rewrite(&mut chained, Some(peer)).unwrap();
        assert_eq!(chained.headers[X_FORWARDED_FOR], "192.0.2.1, 10.0.0.7");
    }

    #[test]
    fn test_parse_rejects_relative_url() {
        assert!(matches!(
            UpstreamTarget::parse("/oauth2/tokeninfo"),
            Err(UpstreamError::InvalidTarget(_))
        ));
    }
}
