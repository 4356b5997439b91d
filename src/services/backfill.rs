use crate::config::BackfillSettings;
use crate::database::{BatchRequest, TreeDistanceStore};
use crate::domain::{DistanceBucket, DistanceHistogram};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How a backfill run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every record that was pending at the start now has a value.
    Completed,
    /// The empty-batch limit was reached while rows were still unset.
    Stalled { remaining: u64 },
}

#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_records: u64,
    pub pending_at_start: u64,
    pub processed: u64,
    // selections attempted, including empty and failed ones
    pub batches: u32,
    pub failed_batches: u32,
    pub largest_batch: u64,
    pub termination: Termination,
    pub histogram: DistanceHistogram,
}

/// Fills `distance_to_road_m` batch by batch until nothing is left or progress stops.
///
/// The cursor is the "still unset" predicate itself, so a failed or interrupted batch
/// leaves its rows eligible and the next selection simply picks them up again.
pub struct BackfillJob {
    store: Arc<dyn TreeDistanceStore>,
    settings: BackfillSettings,
}

impl BackfillJob {
    pub fn new(store: Arc<dyn TreeDistanceStore>, settings: BackfillSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &BackfillSettings {
        &self.settings
    }

    pub async fn run(&self) -> Result<BackfillReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let total_records = self
            .store
            .count_trees()
            .await
            .context("Failed to count trees")?;
        let pending_at_start = self
            .store
            .count_pending()
            .await
            .context("Failed to count trees without a road distance")?;

        info!(
            %run_id,
            total_records,
            pending = pending_at_start,
            radius_m = self.settings.radius_m,
            batch_size = self.settings.batch_size,
            "starting distance backfill"
        );

        let request = BatchRequest {
            radius_m: self.settings.radius_m,
            batch_size: self.settings.batch_size,
            sentinel: self.settings.sentinel,
        };

        let mut processed: u64 = 0;
        let mut batches: u32 = 0;
        let mut failed_batches: u32 = 0;
        let mut largest_batch: u64 = 0;
        let mut empty_streak: u32 = 0;

        let hit_empty_limit = loop {
            if processed >= pending_at_start {
                break false;
            }
            if empty_streak >= self.settings.max_empty_batches {
                break true;
            }

            // cooperative pause between batches, never held with a connection
            if batches > 0 && !self.settings.batch_pause.is_zero() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }

            batches += 1;
            match self.store.fill_batch(&request).await {
                Ok(0) => {
                    empty_streak += 1;
                    warn!(%run_id, batch = batches, empty_streak, "batch updated no rows");
                }
                Ok(updated) => {
                    empty_streak = 0;
                    processed += updated;
                    largest_batch = largest_batch.max(updated);
                    info!(
                        %run_id,
                        batch = batches,
                        updated,
                        "processed {}/{}",
                        processed,
                        pending_at_start
                    );
                }
                Err(e) if e.is_fatal() => {
                    return Err(anyhow::Error::new(e).context(format!(
                        "Backfill aborted after {} of {} records",
                        processed, pending_at_start
                    )));
                }
                Err(e) => {
                    // nothing was committed, so the rows are still pending
                    failed_batches += 1;
                    empty_streak += 1;
                    warn!(%run_id, batch = batches, error = %e, "batch failed and was rolled back");
                }
            }
        };

        let histogram = self
            .store
            .distance_histogram(self.settings.sentinel)
            .await
            .context("Failed to build distance histogram")?;

        let remaining = histogram.count(DistanceBucket::Unset);
        let termination = if hit_empty_limit && remaining > 0 {
            warn!(
                %run_id,
                remaining,
                limit = self.settings.max_empty_batches,
                "backfill stopped making progress with rows still unset"
            );
            Termination::Stalled { remaining }
        } else {
            Termination::Completed
        };

        info!(%run_id, processed, batches, failed_batches, ?termination, "distance backfill finished");

        Ok(BackfillReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_records,
            pending_at_start,
            processed,
            batches,
            failed_batches,
            largest_batch,
            termination,
            histogram,
        })
    }
}
