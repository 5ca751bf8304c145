//! Token-info gateway library.
//!
//! Two subsystems share this crate:
//! - `revocation`: validate a revocation feed into typed records and serve
//!   lookups from an atomically swapped snapshot
//! - `tokeninfo`: proxy token-introspection requests to upstream servers
//!   behind a TTL cache, a bulkhead, a deadline and a circuit breaker

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod revocation;
pub mod routing;
pub mod tokeninfo;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
