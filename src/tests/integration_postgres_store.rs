use crate::database::postgres::PgStore;
use crate::database::{BatchRequest, RoadStore, TreeDistanceStore};
use crate::domain::DistanceBucket;
use crate::tests::mocks::meridian_road;
use sqlx::postgres::PgPoolOptions;

// these run against a scratch PostGIS database:
// TEST_DATABASE_URL=postgres://... cargo test -- --ignored
async fn setup_test_db() -> PgStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DROP TABLE IF EXISTS trees").execute(&pool).await.unwrap();
    sqlx::query(
        "CREATE TABLE trees (
            id BIGINT PRIMARY KEY,
            geom geometry(Point, 4326) NOT NULL,
            distance_to_road_m DOUBLE PRECISION
        )",
    )
        .execute(&pool)
        .await
        .unwrap();

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // twelve trees ~10.5 m apart heading east from 73.85
    sqlx::query(
        "INSERT INTO trees (id, geom)
         SELECT i, ST_SetSRID(ST_MakePoint(73.85 + 0.0001 * i, 18.52), 4326)
         FROM generate_series(1, 12) AS i",
    )
    .execute(&pool)
    .await
    .unwrap();

    PgStore::new(pool)
}

#[tokio::test]
#[ignore = "requires a PostGIS database at TEST_DATABASE_URL"]
async fn test_postgres_batches_and_histogram() {
    let store = setup_test_db().await;
    store
        .replace_roads(&[meridian_road(1, 73.85, 18.50, 18.54)])
        .await
        .unwrap();

    let request = BatchRequest {
        radius_m: 100.0,
        batch_size: 5,
        sentinel: 999.0,
    };
    assert_eq!(store.count_pending().await.unwrap(), 12);
    assert_eq!(store.fill_batch(&request).await.unwrap(), 5);
    assert_eq!(store.fill_batch(&request).await.unwrap(), 5);
    assert_eq!(store.fill_batch(&request).await.unwrap(), 2);
    assert_eq!(store.fill_batch(&request).await.unwrap(), 0);

    let histogram = store.distance_histogram(999.0).await.unwrap();
    assert_eq!(histogram.total(), 12);
    assert_eq!(histogram.count(DistanceBucket::Unset), 0);
    assert_eq!(histogram.count(DistanceBucket::NoRoad), 3);

    assert_eq!(store.reset_distances().await.unwrap(), 12);
    assert_eq!(store.count_pending().await.unwrap(), 12);
}

#[tokio::test]
#[ignore = "requires a PostGIS database at TEST_DATABASE_URL"]
async fn test_postgres_replace_roads() {
    let store = setup_test_db().await;
    let roads = vec![
        meridian_road(1, 73.85, 18.50, 18.54),
        meridian_road(2, 73.86, 18.50, 18.54),
    ];

    assert_eq!(store.replace_roads(&roads).await.unwrap(), 2);
    assert_eq!(store.replace_roads(&roads[..1]).await.unwrap(), 1);
    assert_eq!(store.road_count().await.unwrap(), 1);
}
