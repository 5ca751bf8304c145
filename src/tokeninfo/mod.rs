//! Token-info request handling.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → routing::HandlerChain (first handler whose matches() is true)
//!     → TokenInfoHandler::handle()
//!         → token.rs (bearer extraction)
//!         → proxy/ (cache → resilience executor → upstream)
//!     → Response
//! ```

pub mod proxy;
pub mod token;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use token::access_token;

/// Content type of every JSON body the gateway writes.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// A request handler that can be registered in a handler chain.
pub trait TokenInfoHandler: Send + Sync {
    /// Whether this handler wants the request.
    fn matches(&self, req: &Request<Body>) -> bool;

    /// Serve the request. Always produces a response.
    fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Response>;
}

/// Errors reported to the client in the OAuth2 error format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenInfoError {
    #[error("Access Token not valid")]
    InvalidRequest,
}

impl TokenInfoError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenInfoError::InvalidRequest => "invalid_request",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TokenInfoError::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TokenInfoError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code(),
            "error_description": self.to_string(),
        });
        (
            self.status(),
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
            body.to_string(),
        )
            .into_response()
    }
}
