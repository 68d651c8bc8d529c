//! Image record repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use ibed_core::{Fingerprint, ImageRecord, UserId};
use std::collections::BTreeSet;

/// Repository for image records and their derived indexes.
#[async_trait]
pub trait ImageRepo: Send + Sync {
    /// Write the record, its tag set, its ownership entry, and its tag index
    /// entries in one atomic batch. Idempotent.
    ///
    /// The record and its tag set expire at `created_at + retention`. The
    /// shared ownership and tag index sets expire no earlier than that; a save
    /// never shortens them. Returns `Invalid` for a record already past its
    /// retention window.
    async fn save_image(&self, record: &ImageRecord) -> MetadataResult<()>;

    /// Get a record with its tags taken from the live tag set.
    /// Returns `NotFound` when the record is absent or expired.
    async fn get_image(&self, id: &Fingerprint) -> MetadataResult<ImageRecord>;

    async fn image_exists(&self, id: &Fingerprint) -> MetadataResult<bool>;

    /// Remove the record key only. Index entries are left behind.
    /// Deleting an absent record is not an error.
    async fn delete_image(&self, id: &Fingerprint) -> MetadataResult<()>;

    /// Live tag set of an image.
    async fn image_tags(&self, id: &Fingerprint) -> MetadataResult<BTreeSet<String>>;

    /// Enumerate every image id. O(n).
    async fn list_image_ids(&self) -> MetadataResult<Vec<Fingerprint>>;

    /// Ids in an owner's ownership index. May include deleted images.
    async fn owner_image_ids(&self, owner: &UserId) -> MetadataResult<Vec<Fingerprint>>;

    /// Ids in the inverted index for `tag` (case-insensitive). May include
    /// deleted images.
    async fn tag_image_ids(&self, tag: &str) -> MetadataResult<Vec<Fingerprint>>;

    /// Resolve ids to records, skipping ids whose record no longer exists.
    async fn resolve_images(&self, ids: &[Fingerprint]) -> MetadataResult<Vec<ImageRecord>>;

    /// Records owned by `owner`.
    async fn owner_images(&self, owner: &UserId) -> MetadataResult<Vec<ImageRecord>> {
        let ids = self.owner_image_ids(owner).await?;
        self.resolve_images(&ids).await
    }

    /// Records carrying `tag`, ignoring case.
    ///
    /// Index entries left behind by a retag are filtered out.
    async fn images_with_tag(&self, tag: &str) -> MetadataResult<Vec<ImageRecord>> {
        let ids = self.tag_image_ids(tag).await?;
        let wanted = tag.trim().to_lowercase();
        Ok(self
            .resolve_images(&ids)
            .await?
            .into_iter()
            .filter(|r| r.tags.iter().any(|t| t.to_lowercase() == wanted))
            .collect())
    }
}
