use crate::error::FatalError;
use crate::location::{Fragment, Location, NodeId, NodeRef};
use crate::output::{ErrorCategory, OutputSink, RingRecord};
use crate::stats::Stats;
use geo::{LineString, Point, Polygon};

/// A way whose node locations are still unknown.
pub fn fragment(id: i64, nodes: &[NodeId]) -> Fragment {
    Fragment::new(id, nodes.iter().map(|&node| NodeRef::new(node)).collect())
}

/// A way with locations already resolved, nodes given as (id, lon, lat).
pub fn located_fragment(id: i64, nodes: &[(NodeId, f64, f64)]) -> Fragment {
    Fragment::new(
        id,
        nodes
            .iter()
            .map(|&(node, lon, lat)| NodeRef::with_location(node, Location::new(lon, lat)))
            .collect(),
    )
}

/// Keeps everything in memory so tests can look at it.
#[derive(Default)]
pub struct MemoryOutput {
    pub error_points: Vec<(Point, ErrorCategory, Option<i64>)>,
    pub error_lines: Vec<(LineString, ErrorCategory, Option<i64>)>,
    pub rings: Vec<(Polygon, RingRecord)>,
    pub land_polygons: Vec<Polygon>,
    pub water_polygons: Vec<Polygon>,
    pub lines: Vec<LineString>,
    pub committed: Option<Stats>,
}

impl MemoryOutput {
    pub fn count_points(&self, category: ErrorCategory) -> usize {
        self.error_points.iter().filter(|(_, c, _)| *c == category).count()
    }

    pub fn count_lines(&self, category: ErrorCategory) -> usize {
        self.error_lines.iter().filter(|(_, c, _)| *c == category).count()
    }
}

impl OutputSink for MemoryOutput {
    fn add_error_point(&mut self, point: Point, category: ErrorCategory, id: Option<i64>) {
        self.error_points.push((point, category, id));
    }

    fn add_error_line(&mut self, line: LineString, category: ErrorCategory, id: Option<i64>) {
        self.error_lines.push((line, category, id));
    }

    fn add_ring(&mut self, polygon: Polygon, record: RingRecord) {
        self.rings.push((polygon, record));
    }

    fn add_land_polygon(&mut self, polygon: Polygon) {
        self.land_polygons.push(polygon);
    }

    fn add_water_polygon(&mut self, polygon: Polygon) {
        self.water_polygons.push(polygon);
    }

    fn add_line(&mut self, line: LineString) {
        self.lines.push(line);
    }

    fn commit(&mut self, stats: &Stats) -> Result<(), FatalError> {
        self.committed = Some(stats.clone());
        Ok(())
    }
}
