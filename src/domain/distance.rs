use derive_more::derive::Display;
use std::collections::BTreeMap;

/// Upper bounds (exclusive) of the finite histogram buckets, in metres.
pub const BUCKET_EDGES_M: [f64; 3] = [10.0, 25.0, 50.0];

/// Result of a nearest-road lookup for one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceOutcome {
    Measured(f64),
    NoRoadWithinRadius,
}

impl DistanceOutcome {
    pub fn from_nearest(nearest_m: Option<f64>) -> Self {
        match nearest_m {
            Some(d) => Self::Measured(d),
            None => Self::NoRoadWithinRadius,
        }
    }

    /// Value persisted in `distance_to_road_m`.
    pub fn stored_value(self, sentinel: f64) -> f64 {
        match self {
            Self::Measured(d) => d,
            Self::NoRoadWithinRadius => sentinel,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DistanceBucket {
    #[display("0-10 m")]
    UnderTen,
    #[display("10-25 m")]
    TenToTwentyFive,
    #[display("25-50 m")]
    TwentyFiveToFifty,
    #[display("50 m to radius")]
    FiftyToRadius,
    #[display("no road within radius")]
    NoRoad,
    #[display("unset")]
    Unset,
}

impl DistanceBucket {
    pub const ALL: [DistanceBucket; 6] = [
        DistanceBucket::UnderTen,
        DistanceBucket::TenToTwentyFive,
        DistanceBucket::TwentyFiveToFifty,
        DistanceBucket::FiftyToRadius,
        DistanceBucket::NoRoad,
        DistanceBucket::Unset,
    ];

    pub fn classify(value: Option<f64>, sentinel: f64) -> Self {
        match value {
            None => Self::Unset,
            Some(v) if v == sentinel => Self::NoRoad,
            Some(v) if v < BUCKET_EDGES_M[0] => Self::UnderTen,
            Some(v) if v < BUCKET_EDGES_M[1] => Self::TenToTwentyFive,
            Some(v) if v < BUCKET_EDGES_M[2] => Self::TwentyFiveToFifty,
            Some(_) => Self::FiftyToRadius,
        }
    }
}

/// Counts of stored distances per bucket, reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceHistogram {
    counts: BTreeMap<DistanceBucket, u64>,
}

impl DistanceHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bucket: DistanceBucket, count: u64) {
        if count > 0 {
            *self.counts.entry(bucket).or_insert(0) += count;
        }
    }

    pub fn record(&mut self, value: Option<f64>, sentinel: f64) {
        self.add(DistanceBucket::classify(value, sentinel), 1);
    }

    pub fn count(&self, bucket: DistanceBucket) -> u64 {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Every bucket in display order, including empty ones.
    pub fn rows(&self) -> impl Iterator<Item = (DistanceBucket, u64)> + '_ {
        DistanceBucket::ALL
            .into_iter()
            .map(move |bucket| (bucket, self.count(bucket)))
    }
}
