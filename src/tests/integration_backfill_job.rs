use crate::database::memory::MemoryStore;
use crate::database::{BatchRequest, RoadStore, StoreError, TreeDistanceStore};
use crate::domain::{DistanceBucket, DistanceHistogram};
use crate::services::{BackfillJob, Termination};
use crate::tests::mocks::{meridian_road, quick_settings, tree_row, FlakyStore, InjectedFailure};
use async_trait::async_trait;
use std::sync::Arc;

// twelve trees ~10.5 m apart heading east from a north-south road
async fn seeded_store(trees: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_trees(tree_row(trees)));
    store
        .replace_roads(&[meridian_road(1, 73.85, 18.50, 18.54)])
        .await
        .unwrap();
    store
}

// --- Manual Mock: a store whose updates never match the pending rows ---
struct StuckStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl TreeDistanceStore for StuckStore {
    async fn count_trees(&self) -> Result<u64, StoreError> {
        self.inner.count_trees().await
    }

    async fn count_pending(&self) -> Result<u64, StoreError> {
        self.inner.count_pending().await
    }

    async fn reset_distances(&self) -> Result<u64, StoreError> {
        self.inner.reset_distances().await
    }

    async fn fill_batch(&self, _request: &BatchRequest) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn distance_histogram(&self, sentinel: f64) -> Result<DistanceHistogram, StoreError> {
        self.inner.distance_histogram(sentinel).await
    }
}

// the landmark scenario: 12 records in batches of 5 -> 5, 5, 2
#[tokio::test]
async fn test_backfill_twelve_records_in_batches_of_five() {
    let store = seeded_store(12).await;
    let flaky = FlakyStore::new(store.clone());
    let job = BackfillJob::new(Arc::new(flaky.clone()), quick_settings(5));

    let report = job.run().await.unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.total_records, 12);
    assert_eq!(report.pending_at_start, 12);
    assert_eq!(report.processed, 12);
    assert_eq!(report.batches, 3);
    assert_eq!(report.largest_batch, 5);
    assert_eq!(report.failed_batches, 0);

    // no write ever asked for more than the batch size
    assert!(flaky.batch_sizes.lock().unwrap().iter().all(|b| *b == 5));

    let histogram = &report.histogram;
    assert_eq!(histogram.total(), 12);
    assert_eq!(histogram.count(DistanceBucket::Unset), 0);
    assert_eq!(histogram.count(DistanceBucket::TenToTwentyFive), 2);
    assert_eq!(histogram.count(DistanceBucket::TwentyFiveToFifty), 2);
    assert_eq!(histogram.count(DistanceBucket::FiftyToRadius), 5);
    // trees 10..12 are more than 100 m out
    assert_eq!(histogram.count(DistanceBucket::NoRoad), 3);

    for tree in store.trees() {
        let value = tree.distance_to_road_m.expect("every tree should be filled");
        assert!(value == 999.0 || (0.0..=100.0).contains(&value));
    }
}

#[tokio::test]
async fn test_backfill_is_idempotent() {
    let store = seeded_store(6).await;
    BackfillJob::new(store.clone(), quick_settings(5)).run().await.unwrap();
    let before = store.trees();

    let flaky = FlakyStore::new(store.clone());
    let report = BackfillJob::new(Arc::new(flaky.clone()), quick_settings(5))
        .run()
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.processed, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(flaky.fill_calls(), 0);
    assert_eq!(store.trees(), before);
}

#[tokio::test]
async fn test_failed_batch_is_retried_by_next_selection() {
    let store = seeded_store(12).await;
    let flaky = FlakyStore::new(store.clone());
    flaky.fail_on(2, InjectedFailure::Query);

    let report = BackfillJob::new(Arc::new(flaky.clone()), quick_settings(5))
        .run()
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.processed, 12);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.batches, 4);
    assert_eq!(store.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unavailable_pool_aborts_the_job() {
    let store = seeded_store(12).await;
    let flaky = FlakyStore::new(store.clone());
    flaky.fail_on(2, InjectedFailure::Unavailable);

    let err = BackfillJob::new(Arc::new(flaky), quick_settings(5))
        .run()
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("no database connection available"));
    assert!(err.downcast_ref::<StoreError>().is_some());
    // the first batch stays committed
    assert_eq!(store.count_pending().await.unwrap(), 7);
}

#[tokio::test]
async fn test_persistent_failures_still_terminate() {
    let store = seeded_store(12).await;
    let flaky = FlakyStore::new(store.clone());
    for call in 1..=3 {
        flaky.fail_on(call, InjectedFailure::Query);
    }

    let report = BackfillJob::new(Arc::new(flaky.clone()), quick_settings(5))
        .run()
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Stalled { remaining: 12 });
    assert_eq!(report.failed_batches, 3);
    assert_eq!(flaky.fill_calls(), 3);
}

#[tokio::test]
async fn test_stalled_run_is_reported_distinctly() {
    let store = seeded_store(4).await;
    let job = BackfillJob::new(Arc::new(StuckStore { inner: store }), quick_settings(5));

    let report = job.run().await.unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(report.processed, 0);
    assert_eq!(report.termination, Termination::Stalled { remaining: 4 });
    assert_eq!(report.histogram.count(DistanceBucket::Unset), 4);
}

#[tokio::test]
async fn test_stale_pending_count_ends_as_completed() {
    // the count claims 3 more rows than will ever show up
    let store = seeded_store(12).await;
    let mut flaky = FlakyStore::new(store.clone());
    flaky.extra_pending = 3;

    let report = BackfillJob::new(Arc::new(flaky), quick_settings(5))
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, 12);
    // three real batches plus the empty streak
    assert_eq!(report.batches, 6);
    assert_eq!(report.termination, Termination::Completed);
}

#[tokio::test]
async fn test_iteration_bound() {
    for (trees, batch_size) in [(0, 5), (1, 1), (7, 3), (12, 5), (20, 20), (21, 4)] {
        let store = seeded_store(trees).await;
        let settings = quick_settings(batch_size);
        let limit = settings.max_empty_batches;

        let report = BackfillJob::new(store.clone(), settings).run().await.unwrap();

        let bound = (trees as u32).div_ceil(batch_size) + limit;
        assert!(
            report.batches <= bound,
            "{} trees / batch {} took {} batches",
            trees,
            batch_size,
            report.batches
        );
        assert_eq!(report.processed, trees as u64);
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_summary_table_lists_every_bucket() {
    let store = seeded_store(12).await;
    let report = BackfillJob::new(store, quick_settings(5)).run().await.unwrap();

    let table = report.to_string();
    assert!(table.contains("processed"));
    assert!(table.contains("completed"));
    for bucket in DistanceBucket::ALL {
        assert!(table.contains(&bucket.to_string()), "missing {}", bucket);
    }
    assert!(table.trim_end().ends_with("12"));
}
