//! Global popularity ranking.

use crate::error::EngineResult;
use ibed_core::Fingerprint;
use ibed_metadata::{KvBackend, MetadataError, keys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

/// The last published top-N list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    /// Image ids, most viewed first.
    pub ids: Vec<Fingerprint>,
    #[serde(with = "time::serde::rfc3339")]
    pub refreshed_at: OffsetDateTime,
}

/// View counts kept in one sorted set, scored by view count.
///
/// Increments are single atomic backend commands; no state is held in
/// process. Ranking entries do not expire with their image record.
pub struct RankingEngine {
    kv: Arc<dyn KvBackend>,
}

impl RankingEngine {
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    /// Count one view of `id` and return the new total.
    #[instrument(skip(self))]
    pub async fn increment_view(&self, id: &Fingerprint) -> EngineResult<u64> {
        let score = self
            .kv
            .sorted_incr(keys::RANKING_VIEWS, &id.to_hex(), 1.0)
            .await?;
        Ok(score_to_count(score))
    }

    /// Current view count of `id`; zero if never viewed.
    pub async fn view_count(&self, id: &Fingerprint) -> EngineResult<u64> {
        let score = self
            .kv
            .sorted_score(keys::RANKING_VIEWS, &id.to_hex())
            .await?;
        Ok(score.map(score_to_count).unwrap_or(0))
    }

    /// Drop `id` from the ranking. Returns whether it was ranked.
    pub async fn forget(&self, id: &Fingerprint) -> EngineResult<bool> {
        Ok(self
            .kv
            .sorted_remove(keys::RANKING_VIEWS, &id.to_hex())
            .await?)
    }

    /// The `n` most viewed ids, descending by view count.
    ///
    /// Order among equal counts is backend-defined.
    pub async fn top_n(&self, n: usize) -> EngineResult<Vec<Fingerprint>> {
        Ok(self
            .top_n_with_scores(n)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Like [`RankingEngine::top_n`], with each id's view count.
    pub async fn top_n_with_scores(&self, n: usize) -> EngineResult<Vec<(Fingerprint, u64)>> {
        let entries = self.kv.sorted_top(keys::RANKING_VIEWS, n).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(member, score)| match Fingerprint::from_hex(&member) {
                Ok(id) => Some((id, score_to_count(score))),
                Err(e) => {
                    warn!(member = %member, error = %e, "Skipping malformed ranking member");
                    None
                }
            })
            .collect())
    }

    /// Store `ids` as the current snapshot.
    pub async fn publish_snapshot(&self, ids: Vec<Fingerprint>) -> EngineResult<RankingSnapshot> {
        let snapshot = RankingSnapshot {
            ids,
            refreshed_at: OffsetDateTime::now_utc(),
        };
        let payload = serde_json::to_vec(&snapshot).map_err(MetadataError::from)?;
        self.kv.set(keys::RANKING_SNAPSHOT, &payload).await?;
        Ok(snapshot)
    }

    /// The last published snapshot, if any.
    pub async fn snapshot(&self) -> EngineResult<Option<RankingSnapshot>> {
        match self.kv.get(keys::RANKING_SNAPSHOT).await? {
            Some(bytes) => {
                let snapshot = serde_json::from_slice(&bytes).map_err(MetadataError::from)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Recompute the top `n` and publish it. Touches no image records.
    #[instrument(skip(self))]
    pub async fn refresh(&self, n: usize) -> EngineResult<RankingSnapshot> {
        let ids = self.top_n(n).await?;
        debug!(count = ids.len(), "Publishing ranking snapshot");
        self.publish_snapshot(ids).await
    }
}

fn score_to_count(score: f64) -> u64 {
    // Scores only ever grow by whole increments from zero
    if score.is_finite() && score > 0.0 {
        score.round() as u64
    } else {
        0
    }
}
