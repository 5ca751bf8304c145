//! Revocation snapshots and their atomic publication.
//!
//! # Data Flow
//! ```text
//! feed entries
//!     → ingest() (normalize each entry, skip rejects)
//!     → RevocationSnapshot (immutable)
//!     → RevocationStore::publish() (ArcSwap)
//!     → readers see either the old or the new snapshot, never a mix
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::revocation::error::RevocationError;
use crate::revocation::payload::{FeedEntry, FeedMeta};
use crate::revocation::record::{normalize, RevocationKind, RevocationRecord};

/// A feed entry that failed validation, with its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    pub index: usize,
    pub kind: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: RevocationError,
}

fn serialize_error<S: serde::Serializer>(error: &RevocationError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(error.as_str())
}

/// Claim revocation kept in the lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRevocation {
    pub names: String,
    pub issued_before: i64,
    pub revoked_at: i64,
}

/// Everything revoked as of one feed refresh.
#[derive(Debug, Clone, Default)]
pub struct RevocationSnapshot {
    meta: FeedMeta,
    records: Vec<RevocationRecord>,
    tokens: HashMap<String, i64>,
    claims: HashMap<String, ClaimRevocation>,
    global_cutoff: Option<i64>,
}

impl RevocationSnapshot {
    /// Build a snapshot from already validated records.
    pub fn from_records(meta: FeedMeta, records: Vec<RevocationRecord>) -> Self {
        let mut tokens = HashMap::new();
        let mut claims = HashMap::new();
        let mut global_cutoff: Option<i64> = None;

        for record in &records {
            match record {
                RevocationRecord::Token {
                    token_hash,
                    issued_before,
                    ..
                } => {
                    tokens.insert(token_hash.clone(), *issued_before);
                }
                RevocationRecord::Claim {
                    value_hash,
                    names,
                    issued_before,
                    revoked_at,
                } => {
                    claims.insert(
                        value_hash.clone(),
                        ClaimRevocation {
                            names: names.clone(),
                            issued_before: *issued_before,
                            revoked_at: *revoked_at,
                        },
                    );
                }
                RevocationRecord::Global { issued_before, .. } => {
                    global_cutoff = Some(global_cutoff.map_or(*issued_before, |c| c.max(*issued_before)));
                }
            }
        }

        Self {
            meta,
            records,
            tokens,
            claims,
            global_cutoff,
        }
    }

    pub fn meta(&self) -> FeedMeta {
        self.meta
    }

    pub fn records(&self) -> &[RevocationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Latest GLOBAL cutoff, if any.
    pub fn global_cutoff(&self) -> Option<i64> {
        self.global_cutoff
    }

    pub fn claim(&self, value_hash: &str) -> Option<&ClaimRevocation> {
        self.claims.get(value_hash)
    }

    /// Whether `key` is revoked for the given kind.
    ///
    /// TOKEN keys are token hashes, CLAIM keys are value hashes. GLOBAL
    /// ignores the key and reports whether any global cutoff exists.
    pub fn is_revoked(&self, kind: RevocationKind, key: &str) -> bool {
        match kind {
            RevocationKind::Token => self.tokens.contains_key(key),
            RevocationKind::Claim => self.claims.contains_key(key),
            RevocationKind::Global => self.global_cutoff.is_some(),
            RevocationKind::ForceRefresh => false,
        }
    }

    /// Whether a token issued at `issued_at` is revoked, by hash or by a
    /// global cutoff. Cutoffs are exclusive: a token issued exactly at
    /// `issued_before` is still valid.
    pub fn is_token_revoked(&self, token_hash: &str, issued_at: i64) -> bool {
        if let Some(issued_before) = self.tokens.get(token_hash) {
            if issued_at < *issued_before {
                return true;
            }
        }
        matches!(self.global_cutoff, Some(cutoff) if issued_at < cutoff)
    }
}

/// Validate a batch. Rejected entries are skipped and reported; the rest
/// form the snapshot.
pub fn ingest(
    meta: FeedMeta,
    entries: &[FeedEntry],
    now: i64,
) -> (RevocationSnapshot, Vec<RejectedEntry>) {
    let mut records = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let outcome = match entry {
            FeedEntry::Raw(raw) => normalize(raw, now),
            // Fields of the wrong JSON type.
            FeedEntry::Malformed(_) => Err(RevocationError::InvalidRevocation),
        };
        match outcome {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(index, kind = %entry.kind(), error = %error, "Skipping revocation entry");
                rejected.push(RejectedEntry {
                    index,
                    kind: entry.kind().to_string(),
                    error,
                });
            }
        }
    }

    (RevocationSnapshot::from_records(meta, records), rejected)
}

/// Holds the current snapshot; swaps are atomic.
#[derive(Clone, Default)]
pub struct RevocationStore {
    current: Arc<ArcSwap<RevocationSnapshot>>,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(RevocationSnapshot::default())),
        }
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: RevocationSnapshot) {
        tracing::info!(
            records = snapshot.len(),
            refresh_timestamp = snapshot.meta().refresh_timestamp,
            "Publishing revocation snapshot"
        );
        self.current.store(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<RevocationSnapshot> {
        self.current.load_full()
    }

    pub fn is_revoked(&self, kind: RevocationKind, key: &str) -> bool {
        self.current.load().is_revoked(kind, key)
    }

    pub fn is_token_revoked(&self, token_hash: &str, issued_at: i64) -> bool {
        self.current.load().is_token_revoked(token_hash, issued_at)
    }
}
