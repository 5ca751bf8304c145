//! Revocation classification errors.

use thiserror::Error;

/// Why a raw feed entry could not become a [`RevocationRecord`](super::RevocationRecord).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RevocationError {
    /// Structurally malformed for its declared type.
    #[error("invalid revocation data")]
    InvalidRevocation,

    /// CLAIM revocation without any claim names.
    #[error("missing claim name")]
    MissingClaimName,

    /// Unknown type, or a type with no construction path (`FORCEREFRESH`).
    #[error("unsupported revocation type")]
    UnsupportedType,

    /// `issued_before` lies after the validation time.
    #[error("issued in the future")]
    IssuedInFuture,
}

impl RevocationError {
    /// Stable label used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationError::InvalidRevocation => "invalid_revocation",
            RevocationError::MissingClaimName => "missing_claim_name",
            RevocationError::UnsupportedType => "unsupported_type",
            RevocationError::IssuedInFuture => "issued_in_future",
        }
    }
}
