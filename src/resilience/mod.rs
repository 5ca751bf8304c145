//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → executor.rs (named command: bulkhead + deadline)
//!     → circuit_breaker.rs (Closed/Open/Half-Open per command)
//!     → window.rs (rolling success/failure counts)
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline; the future is dropped on expiry
//! - Bulkhead and open-circuit rejections are immediate, never queued
//! - Only failures and timeouts count toward the error rate
//! - Per-command state, so one upstream cannot trip another's circuit

pub mod circuit_breaker;
pub mod executor;
pub mod window;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use executor::{CommandExecutor, CommandSettings, ExecutionError, ResilienceExecutor};
