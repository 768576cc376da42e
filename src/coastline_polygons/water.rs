use super::{halves, rectangle, CoastlinePolygons};
use crate::geometry_engine::{orient_clockwise, polygon_parts, rects_intersect};
use crate::output::OutputSink;
use geo::{coord, BoundingRect, MultiPolygon, Polygon, Rect};

/// The water partition stops halving here even if every leaf is still
/// too full.
const MAX_WATER_SPLIT_DEPTH: u32 = 48;

/// `rect` grown by `margin` on every side.
fn grown(rect: &Rect, margin: f64) -> Rect {
    Rect::new(
        coord! { x: rect.min().x - margin, y: rect.min().y - margin },
        coord! { x: rect.max().x + margin, y: rect.max().y + margin },
    )
}

impl CoastlinePolygons<'_> {
    /// Writes the complement of the land polygons over the working extent
    /// to the water layer. Consumes the land polygons. Returns the number of
    /// water polygons written.
    pub fn output_water_polygons(&mut self, output: &mut dyn OutputSink) -> u32 {
        let land: Vec<(Polygon, Rect)> = std::mem::take(&mut self.polygons)
            .into_iter()
            .filter_map(|polygon| {
                let bounds = polygon.bounding_rect()?;
                Some((polygon, bounds))
            })
            .collect();

        self.split_bbox(self.srs.extent(), land, 0, output)
    }

    /// Halves `envelope` until fewer than the leaf size of polygons touch
    /// it, then subtracts them from the envelope rectangle. Polygons crossing
    /// the split go down both sides.
    ///
    /// Leaf rectangles are grown by the overlap margin, so a half gets every
    /// polygon touching it or its margin. Halving stops early once neither
    /// half sheds a polygon, or at [`MAX_WATER_SPLIT_DEPTH`].
    fn split_bbox(
        &self,
        envelope: Rect,
        land: Vec<(Polygon, Rect)>,
        depth: u32,
        output: &mut dyn OutputSink,
    ) -> u32 {
        if land.len() < self.config.water_leaf_size {
            return self.output_water_leaf(envelope, land, output);
        }

        if depth >= MAX_WATER_SPLIT_DEPTH {
            log::warn!(
                "Not splitting envelope ({:?}),({:?}) with {} polygons any further: depth limit reached",
                envelope.min(),
                envelope.max(),
                land.len()
            );
            return self.output_water_leaf(envelope, land, output);
        }

        log::debug!(
            "split_bbox(): envelope=({:?}),({:?}) polygons={}",
            envelope.min(),
            envelope.max(),
            land.len()
        );

        let (half1, half2) = halves(&envelope);
        let margin = self.config.bbox_overlap;
        let (reach1, reach2) = (grown(&half1, margin), grown(&half2, margin));

        let mut land1: Vec<(Polygon, Rect)> = Vec::new();
        let mut land2: Vec<(Polygon, Rect)> = Vec::new();
        let total = land.len();

        for (polygon, bounds) in land {
            let in1 = rects_intersect(&reach1, &bounds);
            let in2 = rects_intersect(&reach2, &bounds);
            match (in1, in2) {
                (true, true) => {
                    land1.push((polygon.clone(), bounds));
                    land2.push((polygon, bounds));
                }
                (true, false) => land1.push((polygon, bounds)),
                (false, true) => land2.push((polygon, bounds)),
                (false, false) => {}
            }
        }

        if land1.len() == total && land2.len() == total {
            log::warn!(
                "Not splitting envelope ({:?}),({:?}) with {} polygons any further: all of them cross the split",
                envelope.min(),
                envelope.max(),
                total
            );
            drop(land2);
            return self.output_water_leaf(envelope, land1, output);
        }

        self.split_bbox(half1, land1, depth + 1, output) + self.split_bbox(half2, land2, depth + 1, output)
    }

    fn output_water_leaf(&self, envelope: Rect, land: Vec<(Polygon, Rect)>, output: &mut dyn OutputSink) -> u32 {
        let mut water = MultiPolygon::new(vec![rectangle(
            self.srs,
            envelope.min(),
            envelope.max(),
            self.config.bbox_overlap,
        )]);

        for (polygon, _) in &land {
            match self.engine.difference(&water, polygon) {
                Ok(geometry) => match polygon_parts(geometry) {
                    Some(parts) => water = MultiPolygon::new(parts),
                    None => {
                        water = MultiPolygon::new(vec![]);
                        break;
                    }
                },
                Err(e) => {
                    log::warn!(
                        "Dropping water for envelope ({:?}),({:?}): {}",
                        envelope.min(),
                        envelope.max(),
                        e
                    );
                    return 0;
                }
            }
        }
        drop(land);

        let mut written: u32 = 0;
        for mut part in water.0 {
            let Some(bounds) = part.bounding_rect() else {
                continue;
            };
            if self.srs.is_sliver(&bounds) {
                log::debug!("Skipping sliver water polygon at ({:?}),({:?})", bounds.min(), bounds.max());
                continue;
            }
            orient_clockwise(&mut part);
            output.add_water_polygon(part);
            written += 1;
        }
        written
    }
}
