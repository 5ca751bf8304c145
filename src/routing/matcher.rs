//! Request matching for handler selection.
//!
//! # Design Decisions
//! - Disabled restriction = always matches (wildcard)
//! - No regex: token shape is checked in one pass without allocating

use axum::body::Body;
use axum::http::Request;

use crate::tokeninfo::access_token;

/// Hyphen positions in a canonical UUID.
const UUID_HYPHENS: [usize; 4] = [8, 13, 18, 23];
const UUID_LEN: usize = 36;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches requests whose token looks like a lowercase UUID.
#[derive(Debug, Clone, Copy)]
pub struct UuidTokenMatcher {
    enabled: bool,
}

impl UuidTokenMatcher {
    /// With `enabled == false` every request matches.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Matcher for UuidTokenMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        if !self.enabled {
            return true;
        }
        access_token(req).is_some_and(|token| is_uuid_token(&token))
    }
}

/// `82fb6428-767d-411e-a3a1-6c6007a15df4` shape: 36 bytes, hyphens at
/// 8/13/18/23, lowercase hex everywhere else.
pub fn is_uuid_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() != UUID_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(i, &b)| {
        if UUID_HYPHENS.contains(&i) {
            b == b'-'
        } else {
            matches!(b, b'0'..=b'9' | b'a'..=b'f')
        }
    })
}
