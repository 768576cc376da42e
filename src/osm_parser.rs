use crate::error::FatalError;
use crate::location::{Fragment, Location, NodeId, NodeRef};
use crate::output::{ErrorCategory, OutputSink};
use crate::progress::progress_bar;
use crate::ring_collection::{LocationMap, RingCollection};
use geo::Point;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// Raw data from OSM

#[derive(Debug, Deserialize)]
struct OsmElement {
    pub r#type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub nodes: Option<Vec<NodeId>>,
    pub tags: Option<HashMap<String, String>>,
}

impl OsmElement {
    fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags
            .as_ref()
            .and_then(|tags| tags.get(key))
            .is_some_and(|v| v == value)
    }

    fn is_coastline(&self) -> bool {
        self.has_tag("natural", "coastline")
    }
}

#[derive(Deserialize)]
struct RawOsmData {
    pub elements: Vec<OsmElement>,
}

// End raw data

/// Nodes and ways of an Overpass JSON file, ready for the two passes.
///
/// The first pass only needs the ways, the second only the nodes, so the
/// elements are sorted into the two lists once after parsing.
pub struct OsmData {
    nodes: Vec<OsmElement>,
    ways: Vec<OsmElement>,
}

impl OsmData {
    pub fn load(path: &Path) -> Result<Self, FatalError> {
        let bytes = fs::read(path).map_err(|source| FatalError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes).map_err(|source| FatalError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawOsmData = serde_json::from_slice(bytes)?;

        let mut nodes = Vec::new();
        let mut ways = Vec::new();
        for element in raw.elements {
            match element.r#type.as_str() {
                "node" => nodes.push(element),
                "way" => ways.push(element),
                _ => {}
            }
        }
        Ok(Self { nodes, ways })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_ways(&self) -> usize {
        self.ways.len()
    }

    /// First pass: hands every coastline way to the ring collection.
    ///
    /// Ways tagged `coastline=bogus` are left out. Returns the number of
    /// coastline ways skipped because they have no nodes.
    pub fn read_ways(&self, rings: &mut RingCollection) -> u32 {
        let pb = progress_bar(self.ways.len(), "ways");
        let mut skipped: u32 = 0;

        for element in &self.ways {
            pb.inc(1);
            if !element.is_coastline() || element.has_tag("coastline", "bogus") {
                continue;
            }

            let node_ids = element.nodes.as_deref().unwrap_or_default();
            if node_ids.is_empty() {
                log::warn!("Ignoring way {} which has no nodes", element.id);
                skipped += 1;
                continue;
            }

            let fragment = Fragment::new(element.id, node_ids.iter().map(|&id| NodeRef::new(id)).collect());
            rings.add_way(&fragment);
        }

        pb.finish_and_clear();
        skipped
    }

    /// Second pass: writes node locations into the rings through `locations`
    /// and reports nodes that carry the coastline tag themselves. Returns the
    /// number of such tagged nodes.
    pub fn read_nodes(
        &self,
        rings: &mut RingCollection,
        locations: &LocationMap,
        output: &mut dyn OutputSink,
    ) -> u32 {
        let pb = progress_bar(self.nodes.len(), "nodes");
        let mut tagged: u32 = 0;

        for element in &self.nodes {
            pb.inc(1);
            let (Some(lat), Some(lon)) = (element.lat, element.lon) else {
                log::warn!("Ignoring node {} without a location", element.id);
                continue;
            };

            if element.is_coastline() {
                output.add_error_point(Point::new(lon, lat), ErrorCategory::TaggedNode, Some(element.id));
                tagged += 1;
            }

            rings.set_location(locations, element.id, Location::new(lon, lat));
        }

        pb.finish_and_clear();
        tagged
    }
}
