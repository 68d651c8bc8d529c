//! Substring and tag search over image records.

use crate::error::EngineResult;
use crate::metrics;
use ibed_core::ImageRecord;
use ibed_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Page size used when a caller passes a limit of zero.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Replace a zero limit with [`DEFAULT_SEARCH_LIMIT`].
///
/// Callers apply this before searching; the engine treats a limit of zero
/// literally.
pub fn normalize_limit(limit: usize) -> usize {
    if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit }
}

/// Search without a dedicated index engine.
///
/// Free-text queries scan every image record. Privacy is not filtered here.
pub struct SearchEngine {
    metadata: Arc<dyn MetadataStore>,
}

impl SearchEngine {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Records whose description or any tag contains `query`, ignoring case.
    ///
    /// Results follow key enumeration order and are sliced to
    /// `[offset, offset + limit)`. Enumeration stops once the page is full.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> EngineResult<Vec<ImageRecord>> {
        metrics::SEARCHES.inc();
        let needle = query.to_lowercase();
        let wanted = offset.saturating_add(limit);

        let mut matched = 0usize;
        let mut page = Vec::new();
        for id in self.metadata.list_image_ids().await? {
            if matched >= wanted {
                break;
            }
            let record = match self.metadata.get_image(&id).await {
                Ok(record) => record,
                // Expired or deleted between enumeration and read
                Err(MetadataError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if !record.matches_lowercase(&needle) {
                continue;
            }
            if matched >= offset {
                page.push(record);
            }
            matched += 1;
        }
        debug!(matched, returned = page.len(), "Search complete");
        Ok(page)
    }

    /// Records carrying exactly `tag` (case-insensitive), via the tag index.
    pub async fn search_by_tag(
        &self,
        tag: &str,
        offset: usize,
        limit: usize,
    ) -> EngineResult<Vec<ImageRecord>> {
        metrics::SEARCHES.inc();
        let records = self.metadata.images_with_tag(tag).await?;
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}
