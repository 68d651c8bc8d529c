//! Background ranking refresh.

use crate::metrics;
use crate::ranking::RankingEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Spawn the task that republishes the top `top_n` ids every `interval`.
///
/// The first refresh happens one interval after spawning. A failed tick is
/// logged and counted; the loop keeps going. The task exits when `shutdown`
/// turns `true` or its sender is dropped, without waiting for the next tick.
pub fn spawn_refresh_task(
    ranking: Arc<RankingEngine>,
    interval: Duration,
    top_n: usize,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match ranking.refresh(top_n).await {
                        Ok(snapshot) => {
                            metrics::RANKING_REFRESHES.inc();
                            let ids: Vec<String> =
                                snapshot.ids.iter().map(|id| id.to_hex()).collect();
                            tracing::info!(count = ids.len(), ids = ?ids, "Ranking snapshot refreshed");
                        }
                        Err(e) => {
                            metrics::RANKING_REFRESH_FAILURES.inc();
                            tracing::warn!(error = %e, "Ranking refresh failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Ranking refresh task stopped");
    })
}
