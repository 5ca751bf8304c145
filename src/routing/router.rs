//! Handler lookup and dispatch.
//!
//! # Responsibilities
//! - Store the registered handlers in configuration order
//! - Dispatch each request to the first handler that matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan, fine for a handful of upstreams
//! - No match answers `invalid_request` rather than a silent default

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::tokeninfo::{TokenInfoError, TokenInfoHandler};

/// Ordered list of candidate handlers.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn TokenInfoHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier handlers win.
    pub fn register(&mut self, handler: Arc<dyn TokenInfoHandler>) {
        self.handlers.push(handler);
    }

    pub fn with(mut self, handler: Arc<dyn TokenInfoHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn find(&self, req: &Request<Body>) -> Option<&Arc<dyn TokenInfoHandler>> {
        self.handlers.iter().find(|h| h.matches(req))
    }

    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        match self.find(&req) {
            Some(handler) => handler.handle(req).await,
            None => {
                tracing::debug!(path = %req.uri().path(), "No token-info handler matched");
                TokenInfoError::InvalidRequest.into_response()
            }
        }
    }
}
