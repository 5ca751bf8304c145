//! Normalized revocation records and the feed entry validator.
//!
//! # Validation Order
//! ```text
//! type dispatch        → UnsupportedType
//! structural predicate → InvalidRevocation
//! claim names (CLAIM)  → MissingClaimName
//! issued_before > now  → IssuedInFuture
//! ```
//! The order decides which error a malformed entry reports, so every
//! check runs in exactly this sequence.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::revocation::error::RevocationError;
use crate::revocation::payload::RawRevocation;

/// Separator used when flattening claim names.
pub const CLAIM_NAME_SEPARATOR: &str = "|";

/// What a revocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationKind {
    Token,
    Claim,
    Global,
    /// Accepted on the wire, never constructible.
    ForceRefresh,
}

impl RevocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationKind::Token => "TOKEN",
            RevocationKind::Claim => "CLAIM",
            RevocationKind::Global => "GLOBAL",
            RevocationKind::ForceRefresh => "FORCEREFRESH",
        }
    }
}

impl fmt::Display for RevocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationKind {
    type Err = RevocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOKEN" => Ok(RevocationKind::Token),
            "CLAIM" => Ok(RevocationKind::Claim),
            "GLOBAL" => Ok(RevocationKind::Global),
            "FORCEREFRESH" => Ok(RevocationKind::ForceRefresh),
            _ => Err(RevocationError::UnsupportedType),
        }
    }
}

/// One validated revocation fact. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationRecord {
    Token {
        token_hash: String,
        issued_before: i64,
        revoked_at: i64,
    },
    Claim {
        value_hash: String,
        /// Claim names joined with `|`, original order kept.
        names: String,
        issued_before: i64,
        revoked_at: i64,
    },
    Global {
        issued_before: i64,
        revoked_at: i64,
    },
}

impl RevocationRecord {
    pub fn kind(&self) -> RevocationKind {
        match self {
            RevocationRecord::Token { .. } => RevocationKind::Token,
            RevocationRecord::Claim { .. } => RevocationKind::Claim,
            RevocationRecord::Global { .. } => RevocationKind::Global,
        }
    }

    pub fn issued_before(&self) -> i64 {
        match self {
            RevocationRecord::Token { issued_before, .. }
            | RevocationRecord::Claim { issued_before, .. }
            | RevocationRecord::Global { issued_before, .. } => *issued_before,
        }
    }

    pub fn revoked_at(&self) -> i64 {
        match self {
            RevocationRecord::Token { revoked_at, .. }
            | RevocationRecord::Claim { revoked_at, .. }
            | RevocationRecord::Global { revoked_at, .. } => *revoked_at,
        }
    }

    /// Claim names in their original order. Empty for other kinds.
    pub fn claim_names(&self) -> Vec<&str> {
        match self {
            RevocationRecord::Claim { names, .. } => names.split(CLAIM_NAME_SEPARATOR).collect(),
            _ => Vec::new(),
        }
    }
}

/// Validate a raw feed entry against `now` (unix seconds).
pub fn normalize(raw: &RawRevocation, now: i64) -> Result<RevocationRecord, RevocationError> {
    let kind = match raw.kind.parse::<RevocationKind>() {
        Ok(RevocationKind::ForceRefresh) | Err(_) => {
            tracing::warn!(kind = %raw.kind, "Unsupported revocation type");
            return Err(RevocationError::UnsupportedType);
        }
        Ok(kind) => kind,
    };

    let data = &raw.data;
    match kind {
        RevocationKind::Token => {
            if raw.revoked_at == 0 || data.issued_before == 0 || data.token_hash.is_empty() {
                tracing::warn!(
                    token_hash = %data.token_hash,
                    issued_before = data.issued_before,
                    revoked_at = raw.revoked_at,
                    "Invalid revocation data (TOKEN)"
                );
                return Err(RevocationError::InvalidRevocation);
            }
        }
        RevocationKind::Claim => {
            if raw.revoked_at == 0 || data.value_hash.is_empty() || data.issued_before == 0 {
                tracing::warn!(
                    value_hash = %data.value_hash,
                    issued_before = data.issued_before,
                    revoked_at = raw.revoked_at,
                    "Invalid revocation data (CLAIM)"
                );
                return Err(RevocationError::InvalidRevocation);
            }
            if data.names.is_empty() {
                tracing::warn!(value_hash = %data.value_hash, "Invalid revocation data (missing claim names)");
                return Err(RevocationError::MissingClaimName);
            }
        }
        RevocationKind::Global => {
            if raw.revoked_at == 0 || data.issued_before == 0 {
                tracing::warn!(
                    issued_before = data.issued_before,
                    revoked_at = raw.revoked_at,
                    "Invalid revocation data (GLOBAL)"
                );
                return Err(RevocationError::InvalidRevocation);
            }
        }
        RevocationKind::ForceRefresh => return Err(RevocationError::UnsupportedType),
    }

    if data.issued_before > now {
        tracing::warn!(
            now,
            issued_before = data.issued_before,
            kind = %kind,
            "Invalid revocation data, issued_before is in the future"
        );
        return Err(RevocationError::IssuedInFuture);
    }

    let record = match kind {
        RevocationKind::Token => RevocationRecord::Token {
            token_hash: data.token_hash.clone(),
            issued_before: data.issued_before,
            revoked_at: raw.revoked_at,
        },
        RevocationKind::Claim => RevocationRecord::Claim {
            value_hash: data.value_hash.clone(),
            names: data.names.join(CLAIM_NAME_SEPARATOR),
            issued_before: data.issued_before,
            revoked_at: raw.revoked_at,
        },
        _ => RevocationRecord::Global {
            issued_before: data.issued_before,
            revoked_at: raw.revoked_at,
        },
    };
    Ok(record)
}
