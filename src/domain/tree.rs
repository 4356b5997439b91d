use geo::Point;

/// A tree from the inventory, as far as the import job cares about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    pub id: i64,
    // x = longitude, y = latitude
    pub location: Point<f64>,
    pub distance_to_road_m: Option<f64>,
}

impl TreeRecord {
    pub fn new(id: i64, lon: f64, lat: f64) -> Self {
        Self {
            id,
            location: Point::new(lon, lat),
            distance_to_road_m: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.distance_to_road_m.is_none()
    }
}
