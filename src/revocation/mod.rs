//! Revocation subsystem.
//!
//! # Data Flow
//! ```text
//! provider feed (JSON)
//!     → payload.rs (wire shape)
//!     → record.rs (normalize each entry, classify rejects)
//!     → store.rs (snapshot + atomic swap, lookups)
//!     ← refresh.rs (periodic fetch driving the above)
//! ```
//!
//! # Design Decisions
//! - A bad entry is skipped and reported; the rest of the batch is kept
//! - Each refresh replaces the whole snapshot
//! - Nothing is persisted across restarts

pub mod error;
pub mod payload;
pub mod record;
pub mod refresh;
pub mod store;

pub use error::RevocationError;
pub use payload::{FeedEntry, FeedMeta, RawRevocation, RawRevocationData, RevocationFeed};
pub use record::{normalize, RevocationKind, RevocationRecord};
pub use refresh::{unix_now, RefreshError, RefreshOutcome, RevocationRefresher};
pub use store::{ingest, RejectedEntry, RevocationSnapshot, RevocationStore};
