use crate::config::FetchConfig;
use crate::database::RoadStore;
use crate::domain::Road;
use crate::overpass::query::road_query;
use crate::overpass::{fetch_with_mirrors, GeodataSource, OverpassElement};
use anyhow::{bail, Context, Result};
use geo::{Coord, LineString};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct RoadAssembly {
    pub roads: Vec<Road>,
    // ways that could not become a line (no highway tag, fewer than two known nodes)
    pub dropped_ways: usize,
}

/// Resolves way node references against the nodes of the same response.
pub fn assemble_roads(elements: &[OverpassElement]) -> RoadAssembly {
    let nodes: HashMap<i64, Coord<f64>> = elements
        .iter()
        .filter_map(|element| match element {
            OverpassElement::Node { id, lat, lon, .. } => Some((*id, Coord { x: *lon, y: *lat })),
            _ => None,
        })
        .collect();

    let mut assembly = RoadAssembly::default();

    for element in elements {
        let OverpassElement::Way { id, nodes: refs, tags } = element else {
            continue;
        };

        let Some(highway) = tags.get("highway") else {
            assembly.dropped_ways += 1;
            continue;
        };

        let coords: Vec<Coord<f64>> = refs.iter().filter_map(|r| nodes.get(r).copied()).collect();
        if coords.len() < 2 {
            assembly.dropped_ways += 1;
            continue;
        }

        assembly.roads.push(Road {
            osm_id: *id,
            name: tags.get("name").cloned(),
            highway: highway.clone(),
            line: LineString::new(coords),
        });
    }

    assembly
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadImportReport {
    pub fetched_ways: usize,
    pub dropped_ways: usize,
    pub stored_roads: u64,
}

/// Fetches the city's roads through the mirror rotation and replaces the stored set.
pub struct RoadImportService {
    source: Box<dyn GeodataSource>,
    store: Arc<dyn RoadStore>,
    config: FetchConfig,
}

impl RoadImportService {
    pub fn new(source: Box<dyn GeodataSource>, store: Arc<dyn RoadStore>, config: FetchConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub async fn run(&self) -> Result<RoadImportReport> {
        info!(bbox = %self.config.bbox, endpoints = self.config.endpoints.len(), "fetching roads");

        let query = road_query(&self.config.bbox, self.config.timeout);
        let response = fetch_with_mirrors(self.source.as_ref(), &self.config, &query)
            .await
            .context("Failed to fetch roads")?;

        let fetched_ways = response.way_count();
        let assembly = assemble_roads(&response.elements);
        if assembly.dropped_ways > 0 {
            warn!(dropped = assembly.dropped_ways, "some ways could not be turned into lines");
        }
        if assembly.roads.is_empty() {
            bail!("Overpass returned {} ways but none formed a usable road", fetched_ways);
        }

        let stored_roads = self
            .store
            .replace_roads(&assembly.roads)
            .await
            .context("Failed to store roads")?;

        info!(fetched_ways, stored_roads, "roads loaded");

        Ok(RoadImportReport {
            fetched_ways,
            dropped_ways: assembly.dropped_ways,
            stored_roads,
        })
    }
}
