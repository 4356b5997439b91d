use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;

/// Overpass-ordered bounding box: south, west, north, east in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            bail!("latitudes must be within [-90, 90]");
        }
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            bail!("longitudes must be within [-180, 180]");
        }
        if south >= north || west >= east {
            bail!("expected south < north and west < east");
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }
}

impl FromStr for BoundingBox {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .with_context(|| format!("not a coordinate: {:?}", p))
            })
            .collect::<Result<Vec<f64>>>()?;

        match parts.as_slice() {
            [south, west, north, east] => Self::new(*south, *west, *north, *east),
            _ => bail!("expected four comma-separated values, got {}", parts.len()),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}
