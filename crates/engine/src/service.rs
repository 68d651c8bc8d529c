//! Media service: the upload, read, and delete paths.

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::ranking::{RankingEngine, RankingSnapshot};
use crate::search::SearchEngine;
use bytes::Bytes;
use ibed_core::{
    ContentKey, Fingerprint, ImageRecord, MediaType, UserId, extension_from_filename,
    normalize_tags,
};
use ibed_metadata::{MetadataError, MetadataStore};
use ibed_storage::ContentStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

/// One payload to store.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub owner_id: UserId,
    /// Client-supplied name; only its extension is used.
    pub filename: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub data: Bytes,
}

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub id: Fingerprint,
    pub stored_filename: String,
    /// True when identical bytes were already stored and nothing was written.
    pub deduplicated: bool,
}

/// A record together with its payload.
#[derive(Clone, Debug)]
pub struct OpenedImage {
    pub record: ImageRecord,
    pub media_type: Option<MediaType>,
    pub data: Bytes,
}

/// Ties the content store, metadata index, and ranking together.
pub struct MediaService {
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
    ranking: Arc<RankingEngine>,
    search: SearchEngine,
    max_upload_size: u64,
}

impl MediaService {
    pub fn new(
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
        ranking: Arc<RankingEngine>,
        max_upload_size: u64,
    ) -> Self {
        let search = SearchEngine::new(metadata.clone());
        Self {
            content,
            metadata,
            ranking,
            search,
            max_upload_size,
        }
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn ranking(&self) -> &Arc<RankingEngine> {
        &self.ranking
    }

    /// Store a payload, or return the existing record's id for known bytes.
    ///
    /// Two concurrent uploads of the same bytes may both miss the dedup check;
    /// the content write is idempotent and the later metadata commit wins.
    #[instrument(skip(self, request), fields(owner = %request.owner_id, size = request.data.len()))]
    pub async fn upload(&self, request: UploadRequest) -> EngineResult<UploadOutcome> {
        let result = self.upload_inner(request).await;
        if let Err(e) = &result {
            metrics::record_upload_error(e.code());
        }
        result
    }

    async fn upload_inner(&self, request: UploadRequest) -> EngineResult<UploadOutcome> {
        let size = request.data.len() as u64;
        if size > self.max_upload_size {
            return Err(EngineError::PayloadTooLarge {
                size,
                limit: self.max_upload_size,
            });
        }

        let id = Fingerprint::compute(&request.data);
        match self.metadata.get_image(&id).await {
            Ok(existing) => {
                metrics::UPLOADS_DEDUPLICATED.inc();
                debug!(id = %id, "Upload matched an existing record");
                return Ok(UploadOutcome {
                    id,
                    stored_filename: existing.stored_filename,
                    deduplicated: true,
                });
            }
            Err(MetadataError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let media_type = MediaType::detect(&request.data)?;
        let extension = extension_from_filename(&request.filename)
            .unwrap_or_else(|| media_type.extension().to_string());
        let key = ContentKey::new(id, Some(&extension))?;

        self.content.put(&key, request.data).await?;

        let record = ImageRecord {
            id,
            owner_id: request.owner_id,
            stored_filename: key.file_name(),
            description: request.description,
            tags: normalize_tags(&request.tags),
            is_private: request.is_private,
            view_count: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = self.metadata.save_image(&record).await {
            warn!(id = %id, key = %key, error = %e, "Metadata commit failed; payload left orphaned");
            return Err(e.into());
        }

        metrics::UPLOADS_STORED.inc();
        metrics::BYTES_STORED.inc_by(size);
        info!(id = %id, media_type = %media_type, "Stored upload");
        Ok(UploadOutcome {
            id,
            stored_filename: record.stored_filename,
            deduplicated: false,
        })
    }

    /// Upload each request independently.
    pub async fn upload_batch(
        &self,
        requests: Vec<UploadRequest>,
    ) -> Vec<EngineResult<UploadOutcome>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.upload(request).await);
        }
        results
    }

    /// Fetch a record and its payload, counting one view.
    #[instrument(skip(self))]
    pub async fn open(&self, id: &Fingerprint) -> EngineResult<OpenedImage> {
        let mut record = self.metadata.get_image(id).await?;
        record.view_count = self.ranking.increment_view(id).await?;
        metrics::VIEWS.inc();

        let key = record.content_key()?;
        let data = match self.content.get(&key).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                return Err(EngineError::NotFound(format!("payload for image {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        let media_type = MediaType::sniff(&data);
        Ok(OpenedImage {
            record,
            media_type,
            data,
        })
    }

    /// The record with its live view count, without counting a view.
    pub async fn describe(&self, id: &Fingerprint) -> EngineResult<ImageRecord> {
        let mut record = self.metadata.get_image(id).await?;
        record.view_count = self.ranking.view_count(id).await?;
        Ok(record)
    }

    /// Remove a record, its payload, and its ranking entry.
    ///
    /// Tag and ownership index entries stay behind; readers skip them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &Fingerprint) -> EngineResult<()> {
        let record = self.metadata.get_image(id).await?;
        let key = record.content_key()?;

        match self.content.delete(&key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id = %id, key = %key, "Payload already removed");
            }
            Err(e) => return Err(e.into()),
        }
        self.metadata.delete_image(id).await?;
        self.ranking.forget(id).await?;

        metrics::DELETES.inc();
        info!(id = %id, "Deleted image");
        Ok(())
    }

    /// Delete each id independently.
    pub async fn delete_batch(&self, ids: &[Fingerprint]) -> Vec<EngineResult<()>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.delete(id).await);
        }
        results
    }

    /// Substring search over descriptions and tags.
    pub async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> EngineResult<Vec<ImageRecord>> {
        self.search.search(query, offset, limit).await
    }

    /// Exact tag search.
    pub async fn search_by_tag(
        &self,
        tag: &str,
        offset: usize,
        limit: usize,
    ) -> EngineResult<Vec<ImageRecord>> {
        self.search.search_by_tag(tag, offset, limit).await
    }

    /// Images owned by `owner`.
    pub async fn owner_images(&self, owner: &UserId) -> EngineResult<Vec<ImageRecord>> {
        Ok(self.metadata.owner_images(owner).await?)
    }

    /// The `n` most viewed records from the live ranking, with live counts.
    ///
    /// Ranked ids whose record is gone are skipped.
    pub async fn top(&self, n: usize) -> EngineResult<Vec<ImageRecord>> {
        let ranked = self.ranking.top_n_with_scores(n).await?;
        let mut records = Vec::with_capacity(ranked.len());
        for (id, views) in ranked {
            match self.metadata.get_image(&id).await {
                Ok(mut record) => {
                    record.view_count = views;
                    records.push(record);
                }
                Err(MetadataError::NotFound(_)) => {
                    debug!(id = %id, "Skipping ranked id without a record");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }

    /// The first `n` ids of the published ranking snapshot, or the live top
    /// `n` when none exists yet.
    pub async fn popular(&self, n: usize) -> EngineResult<RankingSnapshot> {
        if let Some(mut snapshot) = self.ranking.snapshot().await? {
            snapshot.ids.truncate(n);
            return Ok(snapshot);
        }
        Ok(RankingSnapshot {
            ids: self.ranking.top_n(n).await?,
            refreshed_at: OffsetDateTime::now_utc(),
        })
    }
}
