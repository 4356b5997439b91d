pub mod backfill;
pub mod pipeline;
pub mod report;
pub mod road_import;

pub use backfill::{BackfillJob, BackfillReport, Termination};
pub use pipeline::{run_import, ImportOutcome};
pub use road_import::{assemble_roads, RoadImportReport, RoadImportService};
