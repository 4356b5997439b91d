use crate::config::ImportConfig;
use crate::database::{RoadStore, TreeDistanceStore};
use crate::overpass::GeodataSource;
use crate::services::backfill::{BackfillJob, BackfillReport};
use crate::services::road_import::{RoadImportReport, RoadImportService};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    // None when the fetch was skipped and the stored roads were reused
    pub roads: Option<RoadImportReport>,
    pub backfill: BackfillReport,
}

/// Full import: roads first, then the distance backfill over the loaded set.
pub async fn run_import(
    config: &ImportConfig,
    source: Box<dyn GeodataSource>,
    roads: Arc<dyn RoadStore>,
    trees: Arc<dyn TreeDistanceStore>,
) -> Result<ImportOutcome> {
    let road_report = if config.skip_road_fetch {
        let existing = roads.road_count().await?;
        if existing == 0 {
            bail!("SKIP_ROAD_FETCH is set but no roads are stored");
        }
        info!(roads = existing, "reusing stored roads");
        None
    } else {
        let service = RoadImportService::new(source, roads, config.fetch.clone());
        Some(service.run().await?)
    };

    if config.reset_distances {
        let cleared = trees
            .reset_distances()
            .await
            .context("Failed to reset road distances")?;
        info!(cleared, "cleared previously stored distances");
    }

    let backfill = BackfillJob::new(trees, config.backfill.clone()).run().await?;

    Ok(ImportOutcome {
        roads: road_report,
        backfill,
    })
}
