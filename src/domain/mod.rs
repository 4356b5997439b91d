mod bbox;
mod distance;
mod road;
mod tree;

pub use bbox::BoundingBox;
pub use distance::{DistanceBucket, DistanceHistogram, DistanceOutcome, BUCKET_EDGES_M};
pub use road::Road;
pub use tree::TreeRecord;
