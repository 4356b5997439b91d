use crate::domain::{DistanceHistogram, Road};
use async_trait::async_trait;

pub mod memory;
pub mod postgres;

/// Errors from the tree distance store, split by whether the backfill can keep going.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // the pool could not hand out a connection at all
    #[error("no database connection available: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Unavailable(err),
            other => StoreError::Query(other),
        }
    }
}

/// One unit of backfill work: fill at most `batch_size` pending rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRequest {
    pub radius_m: f64,
    pub batch_size: u32,
    pub sentinel: f64,
}

// generic access to the tree inventory, implementations in "postgres.rs" and "memory.rs"
#[async_trait]
pub trait TreeDistanceStore: Send + Sync {
    async fn count_trees(&self) -> Result<u64, StoreError>;
    async fn count_pending(&self) -> Result<u64, StoreError>;

    /// Clears every stored distance, returns the number of rows touched.
    async fn reset_distances(&self) -> Result<u64, StoreError>;

    /// Selects up to `batch_size` rows whose distance is unset, computes the nearest
    /// road within the radius and writes the distance (or the sentinel) back.
    /// The whole batch commits or none of it does. Returns the number of rows written.
    async fn fill_batch(&self, request: &BatchRequest) -> Result<u64, StoreError>;

    async fn distance_histogram(&self, sentinel: f64) -> Result<DistanceHistogram, StoreError>;
}

#[async_trait]
pub trait RoadStore: Send + Sync {
    /// Swaps the stored road set for `roads`, returns how many were stored.
    async fn replace_roads(&self, roads: &[Road]) -> anyhow::Result<u64>;
    async fn road_count(&self) -> anyhow::Result<u64>;
}
