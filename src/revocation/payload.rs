//! Wire shape of the revocation provider feed.
//!
//! Field names follow the provider exactly. Every field is optional on the
//! wire and a missing or `null` field takes its zero value, so presence
//! checks happen in the validator rather than in serde. An entry whose
//! fields have the wrong JSON type is kept as [`FeedEntry::Malformed`]
//! instead of failing the whole feed.

use serde::{Deserialize, Deserializer, Serialize};

/// A full response from the revocation provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RevocationFeed {
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: FeedMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub revocations: Vec<FeedEntry>,
}

/// One element of `revocations`, decoded as far as it would go.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Raw(RawRevocation),
    Malformed(serde_json::Value),
}

impl FeedEntry {
    /// The declared `type`, or an empty string when there is none.
    pub fn kind(&self) -> &str {
        match self {
            FeedEntry::Raw(raw) => &raw.kind,
            FeedEntry::Malformed(value) => value.get("type").and_then(|t| t.as_str()).unwrap_or_default(),
        }
    }
}

impl From<RawRevocation> for FeedEntry {
    fn from(raw: RawRevocation) -> Self {
        FeedEntry::Raw(raw)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Refresh bookkeeping, passed through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedMeta {
    #[serde(rename = "REFRESH_FROM", default, deserialize_with = "null_as_default")]
    pub refresh_from: i64,

    #[serde(rename = "REFRESH_TIMESTAMP", default, deserialize_with = "null_as_default")]
    pub refresh_timestamp: i64,
}

/// One entry of the feed, before validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRevocation {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub revoked_at: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub data: RawRevocationData,
}

/// Union of the fields used by every revocation type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRevocationData {
    /// CLAIM
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// CLAIM
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub value_hash: String,

    /// CLAIM, TOKEN, GLOBAL
    #[serde(default, deserialize_with = "null_as_default")]
    pub issued_before: i64,

    /// TOKEN
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub token_hash: String,

    /// CLAIM, TOKEN. Carried but not validated.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub hash_algorithm: String,
}
