use super::{halves, rectangle, CoastlinePolygons};
use crate::geometry_engine::{orient_clockwise, polygon_parts};
use geo::{BoundingRect, Polygon};

impl CoastlinePolygons<'_> {
    /// Splits every polygon with more exterior points than the configured
    /// maximum into smaller overlapping pieces.
    pub fn split(&mut self) {
        let polygons = std::mem::take(&mut self.polygons);
        let mut pieces: Vec<Polygon> = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            self.split_polygon(polygon, 0, &mut pieces);
        }
        self.polygons = pieces;
    }

    /// Recursive bisection of one polygon.
    ///
    /// Each step halves the envelope across its longer side, grows both
    /// halves by the overlap margin and intersects. There is no depth limit:
    /// termination relies on the margin check, which stops splitting once
    /// the margin is no longer small against the span being halved.
    fn split_polygon(&mut self, polygon: Polygon, depth: u32, pieces: &mut Vec<Polygon>) {
        self.max_split_depth = self.max_split_depth.max(depth);

        let num_points = polygon.exterior().0.len();
        if num_points <= self.config.max_points {
            pieces.push(polygon);
            return;
        }

        let Some(envelope) = polygon.bounding_rect() else {
            pieces.push(polygon);
            return;
        };

        log::debug!(
            "split_polygon(): depth={} envelope=({:?}),({:?}) num_points={}",
            depth,
            envelope.min(),
            envelope.max(),
            num_points
        );

        let span = envelope.width().max(envelope.height());
        let expand = self.config.bbox_overlap;
        if expand >= span * self.config.split_abort_ratio {
            log::warn!(
                "Not splitting polygon with {} points on outer ring. It would not get smaller because --bbox-overlap is set too high.",
                num_points
            );
            pieces.push(polygon);
            return;
        }

        let (half1, half2) = halves(&envelope);
        let b1 = rectangle(self.srs, half1.min(), half1.max(), expand);
        let b2 = rectangle(self.srs, half2.min(), half2.max(), expand);

        let results = self
            .engine
            .intersection(&polygon, &b1)
            .and_then(|g1| self.engine.intersection(&polygon, &b2).map(|g2| (g1, g2)));

        let (g1, g2) = match results {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("Polygon split at depth {} failed ({}). Keeping un-split polygon.", depth, e);
                pieces.push(polygon);
                return;
            }
        };

        match (polygon_parts(g1), polygon_parts(g2)) {
            (Some(parts1), Some(parts2)) => {
                drop(polygon);
                for mut part in parts1.into_iter().chain(parts2) {
                    orient_clockwise(&mut part);
                    self.split_polygon(part, depth + 1, pieces);
                }
            }
            _ => {
                log::warn!("Polygon split at depth {} was not successful. Keeping un-split polygon.", depth);
                pieces.push(polygon);
            }
        }
    }
}
