use geo::LineString;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    pub osm_id: i64,
    pub name: Option<String>,
    pub highway: String,
    // lon/lat pairs in way order, always at least two
    pub line: LineString<f64>,
}

impl Road {
    /// GeoJSON geometry object, the form PostGIS ingests with `ST_GeomFromGeoJSON`.
    pub fn geometry_geojson(&self) -> Value {
        let coordinates: Vec<[f64; 2]> = self.line.coords().map(|c| [c.x, c.y]).collect();
        json!({ "type": "LineString", "coordinates": coordinates })
    }
}
