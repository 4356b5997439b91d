use crate::database::{BatchRequest, RoadStore, StoreError, TreeDistanceStore};
use crate::domain::{DistanceHistogram, DistanceOutcome, Road, TreeRecord};
use anyhow::Result;
use async_trait::async_trait;
use geo::{BoundingRect, Closest, HaversineClosestPoint, HaversineDistance, Point};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

// length of one degree of latitude on the mean-radius sphere geo's haversine uses
const METRES_PER_DEGREE: f64 = 111_195.08;

type RoadEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// In-process store with the same semantics as the PostGIS one.
/// Roads are indexed by their bounding boxes in an R-tree; candidates are then measured
/// with haversine geometry.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    trees: BTreeMap<i64, TreeRecord>,
    roads: Vec<Road>,
    index: RTree<RoadEnvelope>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trees(trees: impl IntoIterator<Item = TreeRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for tree in trees {
                state.trees.insert(tree.id, tree);
            }
        }
        store
    }

    pub fn insert_tree(&self, tree: TreeRecord) {
        self.lock().trees.insert(tree.id, tree);
    }

    pub fn tree(&self, id: i64) -> Option<TreeRecord> {
        self.lock().trees.get(&id).cloned()
    }

    pub fn trees(&self) -> Vec<TreeRecord> {
        self.lock().trees.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn nearest_road_m(&self, location: Point<f64>, radius_m: f64) -> Option<f64> {
        // a degree of longitude shrinks with latitude, so the longitude span bounds the circle
        let dlon = radius_m / (METRES_PER_DEGREE * location.y().to_radians().cos().max(1e-6));

        self.index
            .locate_within_distance([location.x(), location.y()], dlon * dlon)
            .filter_map(|candidate| {
                let road = &self.roads[candidate.data];
                match road.line.haversine_closest_point(&location) {
                    Closest::Intersection(p) | Closest::SinglePoint(p) => {
                        Some(location.haversine_distance(&p))
                    }
                    Closest::Indeterminate => None,
                }
            })
            .filter(|d| *d <= radius_m)
            .fold(None, |best: Option<f64>, d| {
                Some(best.map_or(d, |b| b.min(d)))
            })
    }
}

#[async_trait]
impl TreeDistanceStore for MemoryStore {
    async fn count_trees(&self) -> Result<u64, StoreError> {
        Ok(self.lock().trees.len() as u64)
    }

    async fn count_pending(&self) -> Result<u64, StoreError> {
        Ok(self.lock().trees.values().filter(|t| t.is_pending()).count() as u64)
    }

    async fn reset_distances(&self) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut touched = 0;
        for tree in state.trees.values_mut() {
            if tree.distance_to_road_m.take().is_some() {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn fill_batch(&self, request: &BatchRequest) -> Result<u64, StoreError> {
        let mut state = self.lock();

        // compute the whole batch before writing anything
        let updates: Vec<(i64, f64)> = state
            .trees
            .values()
            .filter(|t| t.is_pending())
            .take(request.batch_size as usize)
            .map(|t| {
                let nearest = state.nearest_road_m(t.location, request.radius_m);
                let value = DistanceOutcome::from_nearest(nearest).stored_value(request.sentinel);
                (t.id, value)
            })
            .collect();

        for (id, value) in &updates {
            if let Some(tree) = state.trees.get_mut(id) {
                tree.distance_to_road_m = Some(*value);
            }
        }

        Ok(updates.len() as u64)
    }

    async fn distance_histogram(&self, sentinel: f64) -> Result<DistanceHistogram, StoreError> {
        let state = self.lock();
        let mut histogram = DistanceHistogram::new();
        for tree in state.trees.values() {
            histogram.record(tree.distance_to_road_m, sentinel);
        }
        Ok(histogram)
    }
}

#[async_trait]
impl RoadStore for MemoryStore {
    async fn replace_roads(&self, roads: &[Road]) -> Result<u64> {
        let envelopes: Vec<RoadEnvelope> = roads
            .iter()
            .enumerate()
            .filter_map(|(i, road)| {
                let rect = road.line.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                    i,
                ))
            })
            .collect();

        let mut state = self.lock();
        state.roads = roads.to_vec();
        state.index = RTree::bulk_load(envelopes);

        Ok(state.roads.len() as u64)
    }

    async fn road_count(&self) -> Result<u64> {
        Ok(self.lock().roads.len() as u64)
    }
}
