use crate::database::{BatchRequest, RoadStore, StoreError, TreeDistanceStore};
use crate::domain::{DistanceBucket, DistanceHistogram, Road, BUCKET_EDGES_M};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres};

// roads per INSERT statement when loading
const ROAD_INSERT_CHUNK: usize = 1000;

// the nearest road is looked up per tree with a correlated subquery so the planner can use
// the geography GiST index through ST_DWithin. rows without any road in range get the sentinel
const FILL_BATCH_SQL: &str = r#"
    WITH batch AS (
        SELECT id, geom::geography AS geog
        FROM trees
        WHERE distance_to_road_m IS NULL
        ORDER BY id
        LIMIT $1
    ),
    nearest AS (
        SELECT b.id,
               (SELECT MIN(ST_Distance(b.geog, r.geom::geography))
                FROM roads r
                WHERE ST_DWithin(b.geog, r.geom::geography, $2)) AS dist
        FROM batch b
    )
    UPDATE trees t
    SET distance_to_road_m = COALESCE(n.dist, $3)
    FROM nearest n
    WHERE t.id = n.id
"#;

const HISTOGRAM_SQL: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE distance_to_road_m IS NULL) AS unset,
        COUNT(*) FILTER (WHERE distance_to_road_m = $1) AS no_road,
        COUNT(*) FILTER (WHERE distance_to_road_m <> $1 AND distance_to_road_m < $2) AS under_ten,
        COUNT(*) FILTER (WHERE distance_to_road_m <> $1
                           AND distance_to_road_m >= $2 AND distance_to_road_m < $3) AS ten_to_twenty_five,
        COUNT(*) FILTER (WHERE distance_to_road_m <> $1
                           AND distance_to_road_m >= $3 AND distance_to_road_m < $4) AS twenty_five_to_fifty,
        COUNT(*) FILTER (WHERE distance_to_road_m <> $1 AND distance_to_road_m >= $4) AS fifty_to_radius
    FROM trees
"#;

#[derive(sqlx::FromRow)]
struct HistogramRow {
    unset: i64,
    no_road: i64,
    under_ten: i64,
    ten_to_twenty_five: i64,
    twenty_five_to_fifty: i64,
    fifty_to_radius: i64,
}

impl From<HistogramRow> for DistanceHistogram {
    fn from(row: HistogramRow) -> Self {
        let mut histogram = DistanceHistogram::new();
        for (bucket, count) in [
            (DistanceBucket::UnderTen, row.under_ten),
            (DistanceBucket::TenToTwentyFive, row.ten_to_twenty_five),
            (DistanceBucket::TwentyFiveToFifty, row.twenty_five_to_fifty),
            (DistanceBucket::FiftyToRadius, row.fifty_to_radius),
            (DistanceBucket::NoRoad, row.no_road),
            (DistanceBucket::Unset, row.unset),
        ] {
            histogram.add(bucket, count.max(0) as u64);
        }
        histogram
    }
}

/// PostGIS-backed store. The pool is built by the caller and handed in.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TreeDistanceStore for PgStore {
    async fn count_trees(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trees")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_pending(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM trees WHERE distance_to_road_m IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn reset_distances(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE trees SET distance_to_road_m = NULL WHERE distance_to_road_m IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn fill_batch(&self, request: &BatchRequest) -> Result<u64, StoreError> {
        // the transaction owns the connection; dropping it early rolls back and returns it
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query::<Postgres>(FILL_BATCH_SQL)
            .bind(i64::from(request.batch_size))
            .bind(request.radius_m)
            .bind(request.sentinel)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn distance_histogram(&self, sentinel: f64) -> Result<DistanceHistogram, StoreError> {
        let row = sqlx::query_as::<_, HistogramRow>(HISTOGRAM_SQL)
            .bind(sentinel)
            .bind(BUCKET_EDGES_M[0])
            .bind(BUCKET_EDGES_M[1])
            .bind(BUCKET_EDGES_M[2])
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl RoadStore for PgStore {
    async fn replace_roads(&self, roads: &[Road]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open transaction for road load")?;

        sqlx::query("TRUNCATE roads")
            .execute(&mut *tx)
            .await
            .context("Failed to clear roads table")?;

        let mut inserted = 0;
        for chunk in roads.chunks(ROAD_INSERT_CHUNK) {
            let payload: Value = chunk
                .iter()
                .map(|road| {
                    json!({
                        "osm_id": road.osm_id,
                        "name": road.name,
                        "highway": road.highway,
                        "geometry": road.geometry_geojson(),
                    })
                })
                .collect();

            let result = sqlx::query(
                r#"
                INSERT INTO roads (osm_id, name, highway, geom)
                SELECT (r->>'osm_id')::bigint,
                       r->>'name',
                       r->>'highway',
                       ST_SetSRID(ST_GeomFromGeoJSON(r->>'geometry'), 4326)
                FROM jsonb_array_elements($1::jsonb) AS r
                ON CONFLICT (osm_id) DO NOTHING
                "#,
            )
            .bind(payload)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert a chunk of {} roads", chunk.len()))?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit road load")?;

        // fresh statistics so the planner picks the GiST index for the backfill
        sqlx::query("ANALYZE roads")
            .execute(&self.pool)
            .await
            .context("Failed to analyze roads table")?;

        Ok(inserted)
    }

    async fn road_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roads")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count roads")?;
        Ok(count.max(0) as u64)
    }
}
