//! A (possibly unfinished) ring of coastline.
//!
//! Rings are created from a single way and grow as more ways are attached at
//! either end. In OSM the land is to the *left* of a coastline way, so an
//! island is drawn counter-clockwise. GIS convention wants the outer ring of a
//! land polygon clockwise, which is why every geometry built from a ring is
//! reversed by default.

use crate::location::{Fragment, Location, NodeId, NodeRef};
use geo::{Coord, LineString, Point, Polygon};
use itertools::Itertools;
use std::fmt;

#[derive(Clone, Debug)]
pub struct CoastlineRing {
    nodes: Vec<NodeRef>,

    /// Smallest id of all ways making up the ring, used as a stable ring id.
    ring_id: i64,

    /// Number of ways making up the ring. Only used for statistics.
    nways: u32,

    /// Ring was closed or joined synthetically because of missing/wrong data.
    fixed: bool,

    /// Ring is the exterior of some land polygon.
    outer: bool,
}

impl CoastlineRing {
    /// Creates a ring from a fragment. Empty fragments are filtered out by
    /// the caller.
    pub fn from_fragment(fragment: &Fragment) -> Self {
        let mut nodes = Vec::with_capacity(if fragment.is_closed() {
            fragment.nodes.len()
        } else {
            1000
        });
        nodes.extend_from_slice(&fragment.nodes);
        Self {
            nodes,
            ring_id: fragment.id,
            nways: 1,
            fixed: false,
            outer: false,
        }
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn ring_id(&self) -> i64 {
        self.ring_id
    }

    pub fn nways(&self) -> u32 {
        self.nways
    }

    pub fn npoints(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn is_outer(&self) -> bool {
        self.outer
    }

    pub fn set_outer(&mut self) {
        self.outer = true;
    }

    pub fn first_node_id(&self) -> NodeId {
        self.nodes[0].id
    }

    pub fn last_node_id(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1].id
    }

    pub fn first_location(&self) -> Option<Location> {
        self.nodes[0].location
    }

    pub fn last_location(&self) -> Option<Location> {
        self.nodes[self.nodes.len() - 1].location
    }

    pub fn is_closed(&self) -> bool {
        self.first_node_id() == self.last_node_id()
    }

    /// Only lowers the ring id, never raises it.
    fn update_ring_id(&mut self, id: i64) {
        if id < self.ring_id {
            self.ring_id = id;
        }
    }

    pub(crate) fn set_location(&mut self, index: usize, location: Location) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.location = Some(location);
        }
    }

    /// Returns the number of nodes without a location, logging each one when
    /// `report_missing` is set.
    pub fn missing_locations(&self, report_missing: bool) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.location.is_none())
            .inspect(|node| {
                if report_missing {
                    log::debug!("Missing location of node {}", node.id);
                }
            })
            .count()
    }

    /// Prepends a way whose last node is this ring's first node.
    pub fn add_at_front(&mut self, fragment: &Fragment) {
        debug_assert_eq!(Some(self.first_node_id()), fragment.last_node_id());
        let head = &fragment.nodes[..fragment.nodes.len() - 1];
        self.nodes.splice(0..0, head.iter().copied());
        self.update_ring_id(fragment.id);
        self.nways += 1;
    }

    /// Appends a way whose first node is this ring's last node.
    pub fn add_at_end(&mut self, fragment: &Fragment) {
        debug_assert_eq!(Some(self.last_node_id()), fragment.first_node_id());
        self.nodes.extend_from_slice(&fragment.nodes[1..]);
        self.update_ring_id(fragment.id);
        self.nways += 1;
    }

    /// Absorbs `other`, whose first node must be this ring's last node.
    pub fn join(&mut self, other: CoastlineRing) {
        debug_assert_eq!(self.last_node_id(), other.first_node_id());
        self.nodes.extend_from_slice(&other.nodes[1..]);
        self.update_ring_id(other.ring_id);
        self.nways += other.nways;
    }

    /// Absorbs `other` across a gap between this ring's last node and the
    /// other ring's first node. The ring becomes fixed.
    pub fn join_over_gap(&mut self, other: CoastlineRing) {
        if self.last_location() != other.first_location() {
            self.nodes.push(other.nodes[0]);
        }
        self.nodes.extend_from_slice(&other.nodes[1..]);
        self.update_ring_id(other.ring_id);
        self.nways += other.nways;
        self.fixed = true;
    }

    /// Closes the ring by repeating the first node. An already closed ring is
    /// left untouched.
    pub fn close_ring(&mut self) {
        if self.is_closed() {
            return;
        }
        if self.first_location() != self.last_location() {
            self.nodes.push(self.nodes[0]);
        } else {
            self.fake_close();
        }
        self.fixed = true;
    }

    /// Two different nodes at the same location make a ring look open by id
    /// but closed by position. Renaming the last node closes it by id too.
    pub fn fake_close(&mut self) {
        let first_id = self.first_node_id();
        if let Some(last) = self.nodes.last_mut() {
            last.id = first_id;
        }
    }

    /// Closes the Antarctica ring, which arrives open at the antimeridian,
    /// by running synthetic nodes down to the bottom of the map, along it and
    /// back up again.
    pub fn close_antarctica_ring(&mut self, epsg: u32) {
        let min = if epsg == 4326 { -90.0 } else { -85.051_128_8 };
        let min_int = min as i32;

        for lat in ((min_int + 1)..=-78).rev() {
            self.nodes
                .push(NodeRef::with_location(0, Location::new(-180.0, f64::from(lat))));
        }

        for lon in -180..180 {
            self.nodes
                .push(NodeRef::with_location(0, Location::new(f64::from(lon), min)));
        }

        if epsg == 3857 {
            self.nodes
                .push(NodeRef::with_location(0, Location::new(180.0, min)));
        }

        for lat in min_int..-78 {
            self.nodes
                .push(NodeRef::with_location(0, Location::new(180.0, f64::from(lat))));
        }

        self.nodes.push(self.nodes[0]);
        self.fixed = true;
    }

    fn coords(&self, reverse: bool) -> Vec<Coord> {
        let coords = self.nodes.iter().map(|n| n.location.unwrap_or_default().coord());
        if reverse {
            coords.rev().collect()
        } else {
            coords.collect()
        }
    }

    /// Polygon with this ring as exterior, reversed into GIS orientation
    /// when `reverse` is set.
    pub fn polygon(&self, reverse: bool) -> Polygon {
        Polygon::new(LineString::new(self.coords(reverse)), vec![])
    }

    pub fn linestring(&self, reverse: bool) -> LineString {
        LineString::new(self.coords(reverse))
    }

    pub fn first_point(&self) -> Point {
        Point::from(self.first_location().unwrap_or_default().coord())
    }

    pub fn last_point(&self) -> Point {
        Point::from(self.last_location().unwrap_or_default().coord())
    }

    /// Squared planar distance from `location` to this ring's first node.
    pub fn distance_to_start(&self, location: Location) -> Option<f64> {
        self.first_location()
            .map(|start| start.distance_squared(&location))
    }

    /// Consecutive located node pairs, in storage order.
    pub fn segments(&self) -> impl Iterator<Item = (Location, Location)> + '_ {
        self.nodes
            .iter()
            .tuple_windows()
            .filter_map(|(a, b)| Some((a.location?, b.location?)))
    }
}

impl fmt::Display for CoastlineRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoastlineRing(ring_id={}, nways={}, npoints={}, first_node_id={}, last_node_id={}",
            self.ring_id,
            self.nways,
            self.npoints(),
            self.first_node_id(),
            self.last_node_id()
        )?;
        if self.is_closed() {
            write!(f, " [CLOSED]")?;
        }
        write!(f, ")")
    }
}
