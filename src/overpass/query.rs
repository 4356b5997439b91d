use crate::domain::BoundingBox;
use std::time::Duration;

/// Road classes drivers and pedestrians share; footpaths and tracks are left out.
pub const HIGHWAY_CLASSES: [&str; 14] = [
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "unclassified",
    "residential",
    "living_street",
    "service",
];

/// Overpass QL for every road way inside `bbox`, plus the nodes they reference.
pub fn road_query(bbox: &BoundingBox, timeout: Duration) -> String {
    format!(
        "[out:json][timeout:{}];way[\"highway\"~\"^({})$\"]({});(._;>;);out body;",
        timeout.as_secs().max(1),
        HIGHWAY_CLASSES.join("|"),
        bbox
    )
}
