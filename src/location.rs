use geo::Coord;
use std::fmt;

/// Fixed-point scale of a [`Location`]: 1e-7 degrees, the resolution OSM stores.
pub const COORDINATE_PRECISION: f64 = 10_000_000.0;

pub type NodeId = i64;

/// A node position in fixed-point degrees.
///
/// Integer storage makes equality exact and gives segments a total order,
/// which the intersection sweep and the gap closer both rely on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    x: i32,
    y: i32,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            x: (lon * COORDINATE_PRECISION).round() as i32,
            y: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn from_coord(coord: Coord) -> Self {
        Self::new(coord.x, coord.y)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.x) / COORDINATE_PRECISION
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.y) / COORDINATE_PRECISION
    }

    pub fn coord(&self) -> Coord {
        Coord {
            x: self.lon(),
            y: self.lat(),
        }
    }

    /// Squared planar distance in degrees. Not geodesic, only used to rank
    /// gap candidates.
    pub fn distance_squared(&self, other: &Location) -> f64 {
        let dx = self.lon() - other.lon();
        let dy = self.lat() - other.lat();
        dx * dx + dy * dy
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.7}, {:.7})", self.lon(), self.lat())
    }
}

/// A reference to an OSM node. The location stays `None` until the second
/// input pass resolves it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeRef {
    pub id: NodeId,
    pub location: Option<Location>,
}

impl NodeRef {
    pub fn new(id: NodeId) -> Self {
        Self { id, location: None }
    }

    pub fn with_location(id: NodeId, location: Location) -> Self {
        Self {
            id,
            location: Some(location),
        }
    }
}

/// One coastline way as delivered by the reader.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub id: i64,
    pub nodes: Vec<NodeRef>,
}

impl Fragment {
    pub fn new(id: i64, nodes: Vec<NodeRef>) -> Self {
        Self { id, nodes }
    }

    pub fn first_node_id(&self) -> Option<NodeId> {
        self.nodes.first().map(|n| n.id)
    }

    pub fn last_node_id(&self) -> Option<NodeId> {
        self.nodes.last().map(|n| n.id)
    }

    pub fn is_closed(&self) -> bool {
        match (self.first_node_id(), self.last_node_id()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}
