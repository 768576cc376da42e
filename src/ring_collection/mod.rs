//! All coastline rings of a run plus the endpoint indexes used to stitch
//! ways together.
//!
//! The start and end indexes map the first/last node id of every *open* ring
//! to its key. Every structural change keeps them exact: a closed ring has
//! no entries, an open ring has exactly one in each.

mod closing;
mod intersections;

pub use intersections::SegmentWriter;

use crate::coastline_ring::CoastlineRing;
use crate::geometry_engine::{orient_like, polygon_parts, GeometryEngine};
use crate::location::{Fragment, Location, NodeId};
use crate::output::{ErrorCategory, OutputSink, RingRecord};
use fnv::FnvHashMap;
use geo::{Geometry, Polygon, Winding};
use slotmap::SlotMap;

/// Rings with at least this many points are never reported as questionable.
const MAX_NODES_TO_BE_CONSIDERED_QUESTIONABLE: usize = 10_000;

slotmap::new_key_type! {
    /// Key of a ring in a [`RingCollection`]. Keys of removed rings stay
    /// invalid even after their slot is reused.
    pub struct RingKey;
}

/// Position of one node reference inside a ring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocationTarget {
    ring: RingKey,
    index: usize,
}

/// Node id to every slot waiting for that node's location.
///
/// Built once after all ways are read. Filling in locations goes through
/// [`RingCollection::set_location`], so the rings may not be restructured
/// between building the map and using it.
#[derive(Debug, Default)]
pub struct LocationMap {
    targets: FnvHashMap<NodeId, Vec<LocationTarget>>,
}

impl LocationMap {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RingCollection {
    rings: SlotMap<RingKey, CoastlineRing>,
    start_nodes: FnvHashMap<NodeId, RingKey>,
    end_nodes: FnvHashMap<NodeId, RingKey>,

    ways: u32,
    rings_from_single_way: u32,
    fixed_rings: u32,
}

impl RingCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rings in the collection.
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn num_ways(&self) -> u32 {
        self.ways
    }

    pub fn num_rings_from_single_way(&self) -> u32 {
        self.rings_from_single_way
    }

    pub fn num_unconnected_nodes(&self) -> u32 {
        (self.start_nodes.len() + self.end_nodes.len()) as u32
    }

    pub fn num_fixed_rings(&self) -> u32 {
        self.fixed_rings
    }

    pub fn rings(&self) -> impl Iterator<Item = &CoastlineRing> + '_ {
        self.rings.iter().map(|(_, ring)| ring)
    }

    /// Adds a way. A closed way becomes a ring of its own, an open one is
    /// attached to whatever ring it continues.
    pub fn add_way(&mut self, fragment: &Fragment) {
        if fragment.nodes.is_empty() {
            return;
        }

        self.ways += 1;
        if fragment.is_closed() {
            self.rings_from_single_way += 1;
            self.rings.insert(CoastlineRing::from_fragment(fragment));
        } else {
            self.add_partial_ring(fragment);
        }
    }

    fn add_partial_ring(&mut self, fragment: &Fragment) {
        let (Some(first), Some(last)) = (fragment.first_node_id(), fragment.last_node_id()) else {
            return;
        };

        let prev = self.end_nodes.get(&first).copied();
        let next = self.start_nodes.get(&last).copied();

        match (prev, next) {
            (None, None) => {
                let key = self.rings.insert(CoastlineRing::from_fragment(fragment));
                // A second ring starting or ending at the same node takes
                // over the index entry. The first one then stays open.
                if self.start_nodes.insert(first, key).is_some() {
                    log::debug!("Coastline branches at node {first}: two rings start here");
                }
                if self.end_nodes.insert(last, key).is_some() {
                    log::debug!("Coastline branches at node {last}: two rings end here");
                }
            }
            (Some(prev), next) => {
                self.end_nodes.remove(&first);
                let Some(ring) = self.rings.get_mut(prev) else {
                    return;
                };
                ring.add_at_end(fragment);

                if ring.is_closed() {
                    let id = ring.first_node_id();
                    self.start_nodes.remove(&id);
                    return;
                }

                // The way also fits in front of another ring: both rings
                // and the way become one.
                if let Some(next) = next {
                    self.start_nodes.remove(&last);
                    let Some(other) = self.rings.remove(next) else {
                        return;
                    };
                    let Some(ring) = self.rings.get_mut(prev) else {
                        return;
                    };
                    ring.join(other);

                    if ring.is_closed() {
                        let (first_id, last_id) = (ring.first_node_id(), ring.last_node_id());
                        self.start_nodes.remove(&first_id);
                        self.end_nodes.remove(&last_id);
                        return;
                    }
                }

                if let Some(ring) = self.rings.get(prev) {
                    self.end_nodes.insert(ring.last_node_id(), prev);
                }
            }
            (None, Some(next)) => {
                self.start_nodes.remove(&last);
                let Some(ring) = self.rings.get_mut(next) else {
                    return;
                };
                ring.add_at_front(fragment);

                if ring.is_closed() {
                    let id = ring.last_node_id();
                    self.end_nodes.remove(&id);
                    return;
                }
                let id = ring.first_node_id();
                self.start_nodes.insert(id, next);
            }
        }
    }

    /// Registers every node slot of every ring for the location pass.
    pub fn setup_locations(&self) -> LocationMap {
        let mut targets: FnvHashMap<NodeId, Vec<LocationTarget>> = FnvHashMap::default();
        for (key, ring) in self.rings.iter() {
            for (index, node) in ring.nodes().iter().enumerate() {
                targets
                    .entry(node.id)
                    .or_default()
                    .push(LocationTarget {
                        ring: key,
                        index,
                    });
            }
        }
        LocationMap { targets }
    }

    /// Fills in the location of node `id` wherever it is used. Returns the
    /// number of slots written.
    pub fn set_location(&mut self, map: &LocationMap, id: NodeId, location: Location) -> usize {
        let Some(targets) = map.targets.get(&id) else {
            return 0;
        };
        let mut written = 0;
        for target in targets {
            if let Some(ring) = self.rings.get_mut(target.ring) {
                ring.set_location(target.index, location);
                written += 1;
            }
        }
        written
    }

    /// Counts node references still without a location.
    pub fn check_locations(&self, report_missing: bool) -> usize {
        self.rings()
            .map(|ring| ring.missing_locations(report_missing))
            .sum()
    }

    /// Finds the open Antarctica ring, which starts and ends at the
    /// antimeridian around 77.5°S, and closes it along the bottom of the map.
    pub fn close_antarctica_ring(&mut self, epsg: u32) -> bool {
        let found = self.rings.iter().find_map(|(key, ring)| {
            let first = ring.first_location()?;
            let last = ring.last_location()?;
            let at_latitude = |location: Location| location.lat() < -77.0 && location.lat() > -78.0;
            (first.lon() > 179.99 && last.lon() < -179.99 && at_latitude(first) && at_latitude(last))
                .then_some(key)
        });

        let Some(key) = found else {
            return false;
        };
        let Some(ring) = self.rings.get_mut(key) else {
            return false;
        };

        self.end_nodes.remove(&ring.last_node_id());
        self.start_nodes.remove(&ring.first_node_id());
        ring.close_antarctica_ring(epsg);
        true
    }

    /// Writes every ring to the rings layer, or reports why it is not a
    /// ring. Returns the number of warnings.
    pub fn output_rings(&self, engine: &dyn GeometryEngine, output: &mut dyn OutputSink) -> u32 {
        let mut warnings: u32 = 0;

        for ring in self.rings() {
            if ring.is_closed() {
                if ring.npoints() > 3 {
                    let polygon = ring.polygon(true);
                    let reason = engine.validity_reason(&polygon);
                    if let Some(reason) = &reason {
                        log::debug!("Ring {} is invalid: {}", ring.ring_id(), reason.message);
                        let category = if reason.self_intersection {
                            ErrorCategory::SelfIntersection
                        } else {
                            ErrorCategory::Invalid
                        };
                        output.add_error_point(reason.location.into(), category, Some(ring.ring_id()));
                    }
                    let record = RingRecord {
                        osm_id: ring.ring_id(),
                        nways: ring.nways(),
                        npoints: ring.npoints(),
                        fixed: ring.is_fixed(),
                        land: polygon.exterior().is_cw(),
                        valid: reason.is_none(),
                    };
                    output.add_ring(polygon, record);
                } else if ring.npoints() == 1 {
                    output.add_error_point(
                        ring.first_point(),
                        ErrorCategory::SinglePointInRing,
                        Some(ring.first_node_id()),
                    );
                    warnings += 1;
                } else {
                    output.add_error_line(ring.linestring(true), ErrorCategory::NotARing, Some(ring.ring_id()));
                    output.add_error_point(ring.first_point(), ErrorCategory::NotARing, Some(ring.first_node_id()));
                    output.add_error_point(ring.last_point(), ErrorCategory::NotARing, Some(ring.last_node_id()));
                    warnings += 1;
                }
            } else {
                output.add_error_line(ring.linestring(true), ErrorCategory::NotClosed, Some(ring.ring_id()));
                output.add_error_point(ring.first_point(), ErrorCategory::EndPoint, Some(ring.first_node_id()));
                output.add_error_point(ring.last_point(), ErrorCategory::EndPoint, Some(ring.last_node_id()));
                warnings += 1;
            }
        }

        warnings
    }

    /// Simple land polygons for every closed ring with more than three
    /// points. Invalid ones are repaired if the repair gives a single simple
    /// polygon, otherwise dropped. Returns the polygons and the number
    /// dropped.
    pub fn land_polygons(&self, engine: &dyn GeometryEngine) -> (Vec<Polygon>, u32) {
        let mut polygons: Vec<Polygon> = Vec::with_capacity(self.len());
        let mut dropped: u32 = 0;

        for ring in self.rings() {
            if !ring.is_closed() || ring.npoints() <= 3 {
                continue;
            }

            let polygon = ring.polygon(true);
            if engine.is_valid(&polygon) {
                polygons.push(polygon);
                continue;
            }

            match engine.buffer_zero(&polygon) {
                Ok(Geometry::Polygon(mut repaired))
                    if repaired.interiors().is_empty()
                        && repaired.exterior().0.len() > 3
                        && engine.is_valid(&repaired) =>
                {
                    orient_like(&mut repaired, &polygon);
                    polygons.push(repaired);
                }
                Ok(other) => {
                    let parts = polygon_parts(other).map_or(0, |parts| parts.len());
                    log::error!(
                        "Ignoring invalid polygon geometry (ring_id={}, {} parts after repair)",
                        ring.ring_id(),
                        parts
                    );
                    dropped += 1;
                }
                Err(e) => {
                    log::error!("Ignoring invalid polygon geometry (ring_id={}): {}", ring.ring_id(), e);
                    dropped += 1;
                }
            }
        }

        (polygons, dropped)
    }

    /// Reports closed rings that did not end up as the exterior of any land
    /// polygon. These are holes, which in coastline data are often mistakes.
    /// Returns the number of warnings.
    pub fn output_questionable(&mut self, polygons: &[Polygon], output: &mut dyn OutputSink) -> u32 {
        let mut by_start: Vec<(Location, RingKey)> = self
            .rings
            .iter()
            .filter_map(|(key, ring)| Some((ring.first_location()?, key)))
            .collect();
        by_start.sort_unstable_by_key(|(location, _)| *location);

        for polygon in polygons {
            let Some(first) = polygon.exterior().0.first() else {
                continue;
            };
            let location = Location::from_coord(*first);
            let index = by_start.partition_point(|(l, _)| *l < location);
            if let Some((found, key)) = by_start.get(index) {
                if *found == location {
                    if let Some(ring) = self.rings.get_mut(*key) {
                        ring.set_outer();
                    }
                }
            }
        }

        let mut warnings: u32 = 0;
        for ring in self.rings() {
            if !ring.is_outer()
                && ring.is_closed()
                && ring.npoints() > 3
                && ring.npoints() < MAX_NODES_TO_BE_CONSIDERED_QUESTIONABLE
            {
                output.add_error_line(ring.linestring(false), ErrorCategory::Questionable, Some(ring.ring_id()));
                warnings += 1;
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry_engine::GeoEngine;
    use crate::location::NodeRef;
    use crate::test_utilities::{fragment, located_fragment, MemoryOutput};
    use itertools::Itertools;

    /// Every index entry points at a live open ring with the matching end,
    /// and every open ring has exactly one entry in each index.
    pub(super) fn assert_indexes_consistent(collection: &RingCollection) {
        for (id, key) in &collection.start_nodes {
            let ring = collection.rings.get(*key).expect("stale start entry");
            assert!(!ring.is_closed());
            assert_eq!(ring.first_node_id(), *id);
        }
        for (id, key) in &collection.end_nodes {
            let ring = collection.rings.get(*key).expect("stale end entry");
            assert!(!ring.is_closed());
            assert_eq!(ring.last_node_id(), *id);
        }
        let open = collection.rings().filter(|r| !r.is_closed()).count();
        assert_eq!(collection.start_nodes.len(), open);
        assert_eq!(collection.end_nodes.len(), open);
    }

    #[test]
    fn test_two_way_ring_in_either_order() {
        let f1 = fragment(7, &[1, 2]);
        let f2 = fragment(4, &[2, 1]);

        for order in [[&f1, &f2], [&f2, &f1]] {
            let mut collection = RingCollection::new();
            for f in order {
                collection.add_way(f);
                assert_indexes_consistent(&collection);
            }
            assert_eq!(collection.len(), 1);
            let ring = collection.rings().next().unwrap();
            assert!(ring.is_closed());
            assert_eq!(ring.ring_id(), 4);
            assert_eq!(ring.npoints(), 3);
            assert_eq!(collection.num_unconnected_nodes(), 0);
        }
    }

    #[test]
    fn test_triangle_chain_in_any_order() {
        let ways = [fragment(10, &[1, 2]), fragment(11, &[2, 3]), fragment(12, &[3, 1])];

        for order in ways.iter().permutations(3) {
            let mut collection = RingCollection::new();
            for way in order {
                collection.add_way(way);
                assert_indexes_consistent(&collection);
            }
            assert_eq!(collection.len(), 1);
            let ring = collection.rings().next().unwrap();
            assert!(ring.is_closed());
            assert_eq!(ring.nways(), 3);
            assert_eq!(ring.ring_id(), 10);
            assert_eq!(ring.npoints(), 4);
        }
    }

    #[test]
    fn test_way_bridging_two_rings() {
        let mut collection = RingCollection::new();
        collection.add_way(&fragment(1, &[1, 2, 3]));
        collection.add_way(&fragment(2, &[5, 6, 7]));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.num_unconnected_nodes(), 4);

        collection.add_way(&fragment(3, &[3, 4, 5]));
        assert_indexes_consistent(&collection);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.num_unconnected_nodes(), 2);

        let ring = collection.rings().next().unwrap();
        let ids: Vec<NodeId> = ring.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ring.nways(), 3);
    }

    #[test]
    fn test_stale_key_after_slot_reuse() {
        let mut collection = RingCollection::new();
        collection.add_way(&fragment(1, &[1, 2]));
        collection.add_way(&fragment(2, &[5, 6]));
        let stale = collection.start_nodes[&5];

        // the bridging way pulls the second ring out of its slot, the next
        // way reuses that slot
        collection.add_way(&fragment(3, &[2, 5]));
        collection.add_way(&fragment(4, &[7, 8]));
        assert!(collection.rings.get(stale).is_none());
        assert!(collection.rings.remove(stale).is_none());
        assert_eq!(collection.len(), 2);
        assert_indexes_consistent(&collection);
    }

    #[test]
    fn test_empty_way_is_ignored() {
        let mut collection = RingCollection::new();
        collection.add_way(&Fragment::new(1, vec![]));
        assert_eq!(collection.num_ways(), 0);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_branching_coastline_keeps_newest_entry() {
        let mut collection = RingCollection::new();
        collection.add_way(&fragment(1, &[1, 2]));
        collection.add_way(&fragment(2, &[1, 3]));
        assert_eq!(collection.len(), 2);
        // both rings start at node 1, only the second is indexed there
        assert_eq!(collection.num_unconnected_nodes(), 3);
        assert_eq!(collection.rings.get(collection.start_nodes[&1]).map(|r| r.ring_id()), Some(2));
    }

    #[test]
    fn test_closed_way_counts_as_single_way_ring() {
        let mut collection = RingCollection::new();
        collection.add_way(&fragment(1, &[1, 2, 3, 1]));
        collection.add_way(&fragment(2, &[4, 5]));
        assert_eq!(collection.num_ways(), 2);
        assert_eq!(collection.num_rings_from_single_way(), 1);
        assert_eq!(collection.num_unconnected_nodes(), 2);
        assert_indexes_consistent(&collection);
    }

    #[test]
    fn test_locations_resolved_through_map() {
        let mut collection = RingCollection::new();
        collection.add_way(&fragment(1, &[1, 2]));
        collection.add_way(&fragment(2, &[2, 3, 1]));

        let map = collection.setup_locations();
        assert_eq!(map.len(), 3);
        assert_eq!(collection.check_locations(false), 4);

        // node 1 is used twice, as first and as closing node
        assert_eq!(collection.set_location(&map, 1, Location::new(0.0, 0.0)), 2);
        assert_eq!(collection.set_location(&map, 2, Location::new(1.0, 0.0)), 1);
        assert_eq!(collection.set_location(&map, 99, Location::new(5.0, 5.0)), 0);
        assert_eq!(collection.check_locations(false), 1);

        collection.set_location(&map, 3, Location::new(1.0, 1.0));
        assert_eq!(collection.check_locations(false), 0);
    }

    #[test]
    fn test_antarctica_ring_is_found_and_closed() {
        let mut collection = RingCollection::new();
        collection.add_way(&located_fragment(
            1,
            &[(1, 179.995, -77.5), (2, 0.0, -70.0), (3, -179.995, -77.5)],
        ));
        collection.add_way(&located_fragment(2, &[(10, 10.0, 10.0), (11, 11.0, 10.0)]));

        assert!(collection.close_antarctica_ring(4326));
        assert_indexes_consistent(&collection);
        assert_eq!(collection.num_unconnected_nodes(), 2);
        assert!(!collection.close_antarctica_ring(4326));
    }

    #[test]
    fn test_output_rings_reports_defects() {
        let mut collection = RingCollection::new();
        // clockwise in OSM order, so counter-clockwise once reversed
        collection.add_way(&located_fragment(
            1,
            &[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 1.0, 1.0), (4, 1.0, 0.0), (1, 0.0, 0.0)],
        ));
        collection.add_way(&located_fragment(2, &[(5, 5.0, 5.0), (6, 6.0, 5.0)]));
        collection.add_way(&Fragment::new(3, vec![NodeRef::with_location(7, Location::new(8.0, 8.0))]));
        collection.add_way(&located_fragment(4, &[(8, 9.0, 9.0), (9, 9.5, 9.0), (8, 9.0, 9.0)]));

        let mut output = MemoryOutput::default();
        let warnings = collection.output_rings(&GeoEngine::new(), &mut output);
        assert_eq!(warnings, 3);

        assert_eq!(output.rings.len(), 1);
        let (_, record) = &output.rings[0];
        assert!(!record.land);
        assert!(record.valid);
        assert_eq!(record.npoints, 5);

        assert_eq!(output.count_points(ErrorCategory::EndPoint), 2);
        assert_eq!(output.count_lines(ErrorCategory::NotClosed), 1);
        assert_eq!(output.count_points(ErrorCategory::SinglePointInRing), 1);
        assert_eq!(output.count_points(ErrorCategory::NotARing), 2);
        assert_eq!(output.count_lines(ErrorCategory::NotARing), 1);
    }

    #[test]
    fn test_land_polygons_skip_degenerate_rings() {
        let mut collection = RingCollection::new();
        collection.add_way(&located_fragment(
            1,
            &[(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 1.0, 1.0), (4, 0.0, 1.0), (1, 0.0, 0.0)],
        ));
        collection.add_way(&located_fragment(2, &[(5, 5.0, 5.0), (6, 6.0, 5.0), (5, 5.0, 5.0)]));
        collection.add_way(&located_fragment(3, &[(7, 8.0, 8.0), (8, 9.0, 8.0)]));

        let (polygons, dropped) = collection.land_polygons(&GeoEngine::new());
        assert_eq!(polygons.len(), 1);
        assert_eq!(dropped, 0);
        assert!(polygons[0].exterior().is_cw());
    }

    #[test]
    fn test_holes_are_questionable() {
        let mut collection = RingCollection::new();
        // island, counter-clockwise in OSM order
        collection.add_way(&located_fragment(
            1,
            &[(1, 0.0, 0.0), (2, 4.0, 0.0), (3, 4.0, 4.0), (4, 0.0, 4.0), (1, 0.0, 0.0)],
        ));
        // lake inside it, clockwise in OSM order
        collection.add_way(&located_fragment(
            2,
            &[(5, 1.0, 1.0), (6, 1.0, 2.0), (7, 2.0, 2.0), (8, 2.0, 1.0), (5, 1.0, 1.0)],
        ));

        let engine = GeoEngine::new();
        let (simple, _) = collection.land_polygons(&engine);
        let polygons = engine.organize_polygons(simple).unwrap();
        assert_eq!(polygons.len(), 1);

        let mut output = MemoryOutput::default();
        assert_eq!(collection.output_questionable(&polygons, &mut output), 1);
        assert_eq!(output.count_lines(ErrorCategory::Questionable), 1);
        assert_eq!(output.error_lines[0].2, Some(2));
    }
}
