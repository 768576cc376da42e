//! Planar geometry operations used by polygon assembly and both partitions.
//!
//! Everything goes through [`GeometryEngine`] so that the stages only see
//! `Result`s. [`GeoEngine`] implements it on top of the `geo` crate and turns
//! panics inside `geo` into [`EngineError`]s.

use crate::error::EngineError;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Area, BooleanOps, BoundingRect, Contains, Coord, Geometry, GeometryCollection, InteriorPoint,
    Line, LineString, MultiPolygon, Polygon, Rect, Validation, Winding,
};
use std::panic::{self, AssertUnwindSafe};

/// Why a polygon is not valid, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityReason {
    pub message: String,
    pub location: Coord,
    pub self_intersection: bool,
}

pub trait GeometryEngine {
    /// Intersection of two polygons, normalised with [`normalize`].
    fn intersection(&self, a: &Polygon, b: &Polygon) -> Result<Geometry, EngineError>;

    /// `a` minus `b`, normalised with [`normalize`].
    fn difference(&self, a: &MultiPolygon, b: &Polygon) -> Result<Geometry, EngineError>;

    /// Repairs an invalid polygon the way a zero distance buffer does.
    fn buffer_zero(&self, polygon: &Polygon) -> Result<Geometry, EngineError>;

    fn is_valid(&self, polygon: &Polygon) -> bool;

    /// `None` for a valid polygon.
    fn validity_reason(&self, polygon: &Polygon) -> Option<ValidityReason>;

    /// Turns a set of simple polygons into polygons with holes.
    ///
    /// Clockwise polygons are exteriors. Every counter-clockwise polygon
    /// becomes a hole of the smallest clockwise polygon containing it; those
    /// without one are returned as exteriors of their own.
    fn organize_polygons(&self, polygons: Vec<Polygon>) -> Result<Vec<Polygon>, EngineError>;
}

/// Collapses a boolean operation result into the simplest geometry type:
/// an empty collection, a single polygon or a multipolygon.
pub fn normalize(mut multi: MultiPolygon) -> Geometry {
    match multi.0.len() {
        0 => Geometry::GeometryCollection(GeometryCollection::default()),
        1 => Geometry::Polygon(multi.0.remove(0)),
        _ => Geometry::MultiPolygon(multi),
    }
}

/// Polygon or multipolygon parts of a geometry, `None` for anything else.
pub fn polygon_parts(geometry: Geometry) -> Option<Vec<Polygon>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(vec![polygon]),
        Geometry::MultiPolygon(multi) => Some(multi.0),
        _ => None,
    }
}

/// Boolean operation results come in the overlay's own orientation; land and
/// water output always has a clockwise exterior and counter-clockwise holes.
pub fn orient_clockwise(polygon: &mut Polygon) {
    polygon.exterior_mut(|ring| ring.make_cw_winding());
    polygon.interiors_mut(|rings| {
        for ring in rings {
            ring.make_ccw_winding();
        }
    });
}

/// Gives a repaired polygon the winding `template` had before the repair.
pub fn orient_like(polygon: &mut Polygon, template: &Polygon) {
    if template.exterior().is_cw() {
        orient_clockwise(polygon);
    } else {
        polygon.exterior_mut(|ring| ring.make_ccw_winding());
    }
}

pub fn rect_contains(outer: &Rect, inner: &Rect) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

pub fn rects_intersect(a: &Rect, b: &Rect) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// Engine backed by the `geo` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoEngine;

impl GeoEngine {
    pub fn new() -> Self {
        Self
    }

    fn guarded<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, EngineError> {
        panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            EngineError { operation, message }
        })
    }
}

impl GeometryEngine for GeoEngine {
    fn intersection(&self, a: &Polygon, b: &Polygon) -> Result<Geometry, EngineError> {
        Self::guarded("intersection", || normalize(a.intersection(b)))
    }

    fn difference(&self, a: &MultiPolygon, b: &Polygon) -> Result<Geometry, EngineError> {
        Self::guarded("difference", || normalize(a.difference(b)))
    }

    fn buffer_zero(&self, polygon: &Polygon) -> Result<Geometry, EngineError> {
        // A union with nothing runs the polygon through the overlay
        // normalisation, which splits it at self intersections.
        Self::guarded("buffer", || {
            normalize(polygon.union(&MultiPolygon::<f64>::new(vec![])))
        })
    }

    fn is_valid(&self, polygon: &Polygon) -> bool {
        Self::guarded("is_valid", || polygon.is_valid()).unwrap_or(false)
    }

    fn validity_reason(&self, polygon: &Polygon) -> Option<ValidityReason> {
        let message = match Self::guarded("is_valid", || polygon.check_validation()) {
            Ok(Ok(())) => return None,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };

        match first_self_intersection(polygon) {
            Some(location) => Some(ValidityReason {
                message,
                location,
                self_intersection: true,
            }),
            None => Some(ValidityReason {
                message,
                location: polygon.exterior().0.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 }),
                self_intersection: false,
            }),
        }
    }

    fn organize_polygons(&self, polygons: Vec<Polygon>) -> Result<Vec<Polygon>, EngineError> {
        Self::guarded("organize_polygons", || organize(polygons))
    }
}

struct Outer {
    polygon: Polygon,
    bounds: Option<Rect>,
    area: f64,
}

fn organize(polygons: Vec<Polygon>) -> Vec<Polygon> {
    let (outers, holes): (Vec<Polygon>, Vec<Polygon>) =
        polygons.into_iter().partition(|p| p.exterior().is_cw());

    let outers: Vec<Outer> = outers
        .into_iter()
        .map(|polygon| Outer {
            bounds: polygon.bounding_rect(),
            area: polygon.unsigned_area(),
            polygon,
        })
        .collect();

    let mut leftovers: Vec<Polygon> = Vec::new();
    let mut interiors: Vec<Vec<LineString>> = vec![Vec::new(); outers.len()];

    for hole in holes {
        let (Some(hole_bounds), Some(inside)) = (hole.bounding_rect(), hole.interior_point()) else {
            leftovers.push(hole);
            continue;
        };

        let container = outers
            .iter()
            .enumerate()
            .filter(|(_, outer)| {
                outer
                    .bounds
                    .is_some_and(|bounds| rect_contains(&bounds, &hole_bounds))
            })
            .filter(|(_, outer)| outer.polygon.contains(&inside))
            .min_by(|(_, a), (_, b)| a.area.total_cmp(&b.area))
            .map(|(index, _)| index);

        match container {
            Some(index) => interiors[index].push(hole.into_inner().0),
            None => leftovers.push(hole),
        }
    }

    let mut result: Vec<Polygon> = outers
        .into_iter()
        .zip(interiors)
        .map(|(outer, holes)| Polygon::new(outer.polygon.into_inner().0, holes))
        .collect();
    result.extend(leftovers);
    result
}

/// Location of the first place where two non-adjacent edges of the exterior
/// touch or cross.
fn first_self_intersection(polygon: &Polygon) -> Option<Coord> {
    let mut lines: Vec<(usize, Line)> = polygon.exterior().lines().enumerate().collect();
    let count = lines.len();
    lines.sort_by(|(_, a), (_, b)| a.start.x.min(a.end.x).total_cmp(&b.start.x.min(b.end.x)));

    for (i, (index_a, a)) in lines.iter().enumerate() {
        let max_x = a.start.x.max(a.end.x);
        for (index_b, b) in &lines[i + 1..] {
            if b.start.x.min(b.end.x) > max_x {
                break;
            }
            let distance = index_a.abs_diff(*index_b);
            if distance <= 1 || distance == count - 1 {
                continue;
            }
            match line_intersection(*a, *b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => return Some(intersection),
                Some(LineIntersection::Collinear { intersection }) => return Some(intersection.start),
                None => {}
            }
        }
    }
    None
}
