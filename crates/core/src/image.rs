//! Image record types.

use crate::content_key::ContentKey;
use crate::fingerprint::Fingerprint;
use crate::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::{Duration, OffsetDateTime};

/// Metadata for one stored payload.
///
/// The serialized field names are the persisted encoding and must stay stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Content fingerprint; also the dedup key.
    pub id: Fingerprint,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    /// Name of the payload in the content store (`<hex>.<ext>`).
    #[serde(rename = "filename")]
    pub stored_filename: String,
    #[serde(default)]
    pub description: String,
    /// Cached copy of the tag set. The per-record tag set in the metadata
    /// index is authoritative on read.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(rename = "views", default)]
    pub view_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ImageRecord {
    /// Instant at which the record and its derived index entries expire.
    pub fn expires_at(&self, retention: Duration) -> crate::Result<OffsetDateTime> {
        self.created_at.checked_add(retention).ok_or_else(|| {
            crate::Error::ExpiryOutOfRange(format!(
                "{} + {retention} is not representable",
                self.created_at
            ))
        })
    }

    /// Content store key of the payload, parsed from `stored_filename`.
    pub fn content_key(&self) -> crate::Result<ContentKey> {
        ContentKey::parse(&self.stored_filename)
    }

    /// Whether the description or any tag contains `needle`, ignoring case.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.description.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Trim tags, drop empty ones, and collapse duplicates.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
