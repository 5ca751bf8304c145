//! Upstream token-info proxy.
//!
//! # Data Flow
//! ```text
//! handler.rs (cache lookup, executor, status mapping)
//!     → upstream.rs (request rewrite, hyper client)
//!     → handler.rs (read the body under the deadline, cache a 200)
//! ```

pub mod handler;
pub mod upstream;

pub use handler::ProxyHandler;
pub use upstream::{HttpUpstream, Upstream, UpstreamError, UpstreamTarget};
