//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → routing::HandlerChain (pick a token-info handler)
//!     → response.rs (status bodies, cache headers)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::HttpServer;
