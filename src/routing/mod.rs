//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (token, headers)
//!     → router.rs (walk the handler chain in order)
//!     → matcher.rs (token-shape condition per handler)
//!     → Return: first matching handler, or invalid_request
//! ```
//!
//! # Design Decisions
//! - Chain built at startup from the upstream list, immutable at runtime
//! - No regex in the hot path
//! - Deterministic: same input always picks the same handler
//! - First match wins (configuration order)

pub mod matcher;
pub mod router;

pub use matcher::{is_uuid_token, Matcher, UuidTokenMatcher};
pub use router::HandlerChain;
