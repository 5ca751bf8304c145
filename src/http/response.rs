//! Response helpers shared by the handlers.
//!
//! # Design Decisions
//! - Error responses carry the canonical reason phrase as a plain-text body
//! - Cache provenance is reported in `X-Cache` (`HIT` or `MISS`)

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const CACHE_HIT: HeaderValue = HeaderValue::from_static("HIT");
pub const CACHE_MISS: HeaderValue = HeaderValue::from_static("MISS");

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// `status` with its reason phrase (e.g. `Gateway Timeout`) as the body.
pub fn status_text(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("");
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE))],
        reason,
    )
        .into_response()
}
