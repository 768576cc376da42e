//! Land polygons built from the closed rings, and everything done to them
//! before they are written: direction fix, reprojection, splitting into
//! pieces of bounded size and the water complement.

mod split;
mod water;

use crate::error::FatalError;
use crate::geometry_engine::{orient_clockwise, orient_like, polygon_parts, GeometryEngine};
use crate::output::{ErrorCategory, OutputSink};
use crate::ring_collection::RingCollection;
use crate::srs::{PartitionConfig, Srs};
use crate::stats::RunStatus;
use geo::{coord, Coord, Geometry, LineString, MapCoords, Polygon, Rect, Winding};
use itertools::Itertools;

/// Assembles the land polygons, holes included, from all closed rings.
///
/// Fails when not a single polygon could be built; the caller treats that as
/// one error and skips all polygon output.
pub fn create_polygons(
    rings: &RingCollection,
    engine: &dyn GeometryEngine,
    output: &mut dyn OutputSink,
    status: &mut RunStatus,
) -> Result<Vec<Polygon>, String> {
    let (simple, dropped) = rings.land_polygons(engine);
    status.error(dropped);

    if simple.is_empty() {
        return Err("No polygons created!".to_string());
    }

    log::debug!("Organizing {} polygons", simple.len());
    let organized = engine
        .organize_polygons(simple)
        .map_err(|e| format!("No polygons created: {e}"))?;

    let mut polygons: Vec<Polygon> = Vec::with_capacity(organized.len());
    for polygon in organized {
        if engine.is_valid(&polygon) {
            polygons.push(polygon);
            continue;
        }

        output.add_error_line(polygon.exterior().clone(), ErrorCategory::Invalid, None);
        match engine.buffer_zero(&polygon) {
            Ok(Geometry::Polygon(mut repaired)) if engine.is_valid(&repaired) => {
                log::warn!("Repaired invalid polygon geometry");
                orient_like(&mut repaired, &polygon);
                polygons.push(repaired);
                status.warn(1);
            }
            _ => {
                log::error!("Ignoring invalid polygon geometry");
                status.error(1);
            }
        }
    }

    Ok(polygons)
}

/// Rectangle from `min` to `max` grown by `expand` on every side and
/// clipped to the working extent. Clockwise, like land.
pub fn rectangle(srs: &Srs, min: Coord, max: Coord, expand: f64) -> Polygon {
    let extent = srs.extent();
    let min_x = (min.x - expand).max(extent.min().x);
    let min_y = (min.y - expand).max(extent.min().y);
    let max_x = (max.x + expand).min(extent.max().x);
    let max_y = (max.y + expand).min(extent.max().y);

    Polygon::new(
        LineString::from(vec![
            coord! { x: min_x, y: min_y },
            coord! { x: min_x, y: max_y },
            coord! { x: max_x, y: max_y },
            coord! { x: max_x, y: min_y },
            coord! { x: min_x, y: min_y },
        ]),
        vec![],
    )
}

/// Halves of `envelope` split across its longer side. A square is split
/// into a left and a right half.
pub fn halves(envelope: &Rect) -> (Rect, Rect) {
    let (min, max) = (envelope.min(), envelope.max());
    if envelope.width() < envelope.height() {
        let mid_y = (min.y + max.y) / 2.0;
        (
            Rect::new(min, coord! { x: max.x, y: mid_y }),
            Rect::new(coord! { x: min.x, y: mid_y }, max),
        )
    } else {
        let mid_x = (min.x + max.x) / 2.0;
        (
            Rect::new(min, coord! { x: mid_x, y: max.y }),
            Rect::new(coord! { x: mid_x, y: min.y }, max),
        )
    }
}

pub struct CoastlinePolygons<'a> {
    polygons: Vec<Polygon>,
    engine: &'a dyn GeometryEngine,
    srs: &'a Srs,
    config: PartitionConfig,
    max_split_depth: u32,
}

impl<'a> CoastlinePolygons<'a> {
    pub fn new(
        polygons: Vec<Polygon>,
        engine: &'a dyn GeometryEngine,
        srs: &'a Srs,
        config: PartitionConfig,
    ) -> Self {
        Self {
            polygons,
            engine,
            srs,
            config,
            max_split_depth: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn max_split_depth(&self) -> u32 {
        self.max_split_depth
    }

    /// Turns polygons whose exterior runs counter-clockwise around, holes
    /// included. Returns the number turned.
    pub fn fix_direction(&mut self, output: &mut dyn OutputSink) -> u32 {
        let mut turned: u32 = 0;

        for polygon in &mut self.polygons {
            if polygon.exterior().is_cw() {
                continue;
            }
            polygon.exterior_mut(|ring| ring.0.reverse());
            polygon.interiors_mut(|rings| {
                for ring in rings {
                    ring.0.reverse();
                }
            });
            output.add_error_line(polygon.exterior().clone(), ErrorCategory::Direction, None);
            turned += 1;
        }

        turned
    }

    /// Projects all polygons into the output SRS.
    pub fn transform(&mut self) -> Result<(), FatalError> {
        let srs = self.srs;
        for polygon in &mut self.polygons {
            *polygon = polygon.try_map_coords(|c| srs.transform(c))?;
        }
        Ok(())
    }

    /// Repairs invalid polygons, splitting multipolygon repairs into their
    /// parts. Returns (warnings, errors): one warning per repair, one error
    /// per polygon that had to be dropped.
    pub fn check_polygons(&mut self) -> (u32, u32) {
        let mut warnings: u32 = 0;
        let mut errors: u32 = 0;
        let mut checked: Vec<Polygon> = Vec::with_capacity(self.polygons.len());

        for polygon in std::mem::take(&mut self.polygons) {
            if self.engine.is_valid(&polygon) {
                checked.push(polygon);
                continue;
            }

            let parts = match self.engine.buffer_zero(&polygon) {
                Ok(geometry) => polygon_parts(geometry),
                Err(e) => {
                    log::debug!("{e}");
                    None
                }
            };

            match parts {
                Some(parts) if !parts.is_empty() => {
                    log::warn!("Invalid polygon repaired into {} part(s)", parts.len());
                    warnings += 1;
                    for mut part in parts {
                        orient_clockwise(&mut part);
                        checked.push(part);
                    }
                }
                _ => {
                    log::error!("Invalid polygon could not be repaired, dropping it");
                    errors += 1;
                }
            }
        }

        self.polygons = checked;
        (warnings, errors)
    }

    /// Writes all polygons to the land layer. Without `make_copy` the
    /// polygons are handed over and the collection is empty afterwards.
    pub fn output_land_polygons(&mut self, output: &mut dyn OutputSink, make_copy: bool) {
        if make_copy {
            for polygon in &self.polygons {
                output.add_land_polygon(polygon.clone());
            }
        } else {
            for polygon in self.polygons.drain(..) {
                output.add_land_polygon(polygon);
            }
        }
    }

    /// Writes every polygon ring as lines of at most `max_points` points
    /// (0 for no limit), leaving out stretches along the map edge.
    pub fn output_lines(&self, output: &mut dyn OutputSink, max_points: usize) {
        for polygon in &self.polygons {
            self.output_ring_as_lines(polygon.exterior(), max_points, output);
            for ring in polygon.interiors() {
                self.output_ring_as_lines(ring, max_points, output);
            }
        }
    }

    fn output_ring_as_lines(&self, ring: &LineString, max_points: usize, output: &mut dyn OutputSink) {
        let mut line: Vec<Coord> = Vec::new();

        for (&a, &b) in ring.0.iter().tuple_windows() {
            let added = if self.srs.is_bogus_segment(a, b) {
                log::debug!("Suppressing segment ({} {}, {} {}) along the map edge", a.x, a.y, b.x, b.y);
                false
            } else {
                if line.is_empty() {
                    line.push(a);
                }
                line.push(b);
                true
            };

            if (!added || (max_points > 0 && line.len() >= max_points)) && line.len() >= 2 {
                output.add_line(LineString::new(std::mem::take(&mut line)));
            }
        }

        if line.len() >= 2 {
            output.add_line(LineString::new(line));
        }
    }
}
