//! Response caching.
//!
//! # Design Decisions
//! - Keyed by the raw bearer token, values are response body bytes
//! - Expiry is lazy: an expired entry is reported once and removed on read
//! - Size-bounded; inserting into a full cache drops expired entries first,
//!   then the entry closest to expiry
//! - No request coalescing: concurrent misses for one token may both write,
//!   last write wins

pub mod ttl;

pub use ttl::{CacheLookup, TtlCache};
