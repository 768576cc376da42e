use crate::error::FatalError;
use geo::{coord, Coord, Rect};
use std::f64::consts::PI;
use std::fmt;

pub const EPSG_WGS84: u32 = 4326;
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Half the width of the Web Mercator plane in meters.
pub const MERCATOR_MAX: f64 = 20_037_508.342_789_244;

/// Latitude at which Web Mercator becomes square.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// Maps WGS84 coordinates into an output spatial reference.
pub trait Projection {
    fn project(&self, coord: Coord) -> Coord;
}

/// WGS84 output, coordinates pass through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl Projection for Identity {
    fn project(&self, coord: Coord) -> Coord {
        coord
    }
}

/// Spherical Web Mercator (EPSG:3857).
#[derive(Debug, Clone, Copy)]
pub struct SphericalMercator;

impl Projection for SphericalMercator {
    fn project(&self, coord: Coord) -> Coord {
        let lat: f64 = coord.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        let x: f64 = EARTH_RADIUS * coord.x.to_radians();
        let y: f64 = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        coord! { x: x, y: y }
    }
}

/// Output spatial reference with everything that depends on it.
///
/// Built once from the EPSG code and passed to every stage that needs it.
pub struct Srs {
    epsg: u32,
    extent: Rect,
    sliver_boxes: [Rect; 2],

    /// Line output drops segments beyond these, they run along the map edge.
    max_x: f64,
    min_x: f64,
    min_y: f64,

    projection: Box<dyn Projection>,
}

impl Srs {
    pub fn new(epsg: u32) -> Result<Self, FatalError> {
        match epsg {
            EPSG_WGS84 => Ok(Self {
                epsg,
                extent: Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 }),
                sliver_boxes: [
                    Rect::new(
                        coord! { x: -180.0, y: -90.0 },
                        coord! { x: -179.9999, y: -85.0511 },
                    ),
                    Rect::new(
                        coord! { x: 179.9999, y: -90.0 },
                        coord! { x: 180.0, y: -85.0511 },
                    ),
                ],
                max_x: 179.9999,
                min_x: -179.9999,
                min_y: -85.049,
                projection: Box::new(Identity),
            }),
            EPSG_WEB_MERCATOR => Ok(Self {
                epsg,
                extent: Rect::new(
                    coord! { x: -MERCATOR_MAX, y: -MERCATOR_MAX },
                    coord! { x: MERCATOR_MAX, y: MERCATOR_MAX },
                ),
                sliver_boxes: [
                    Rect::new(
                        coord! { x: -MERCATOR_MAX, y: -MERCATOR_MAX },
                        coord! { x: -20_037_500.0, y: -20_037_400.0 },
                    ),
                    Rect::new(
                        coord! { x: 20_037_500.0, y: -MERCATOR_MAX },
                        coord! { x: MERCATOR_MAX, y: -20_037_400.0 },
                    ),
                ],
                max_x: 20_037_500.0,
                min_x: -20_037_500.0,
                min_y: -20_037_400.0,
                projection: Box::new(SphericalMercator),
            }),
            other => Err(FatalError::UnsupportedSrs(other.to_string())),
        }
    }

    /// Parses the command line form of an SRS.
    pub fn parse_code(value: &str) -> Result<u32, String> {
        match value.to_ascii_uppercase().as_str() {
            "WGS84" | "4326" => Ok(EPSG_WGS84),
            "3857" => Ok(EPSG_WEB_MERCATOR),
            "3785" | "900913" => Err(format!(
                "SRS {value} is deprecated, use 3857 for Web Mercator"
            )),
            _ => Err(format!(
                "Unknown SRS '{value}', only 4326 (WGS84) and 3857 (Web Mercator) are supported"
            )),
        }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg == EPSG_WGS84
    }

    pub fn extent(&self) -> Rect {
        self.extent
    }

    /// True if `bounds` lies inside one of the degenerate wedges at the
    /// antimeridian near the bottom of the map.
    pub fn is_sliver(&self, bounds: &Rect) -> bool {
        self.sliver_boxes.iter().any(|sliver| {
            bounds.min().x >= sliver.min().x
                && bounds.min().y >= sliver.min().y
                && bounds.max().x <= sliver.max().x
                && bounds.max().y <= sliver.max().y
        })
    }

    /// True for a segment that only runs along the map edge.
    pub fn is_bogus_segment(&self, a: Coord, b: Coord) -> bool {
        (a.y < self.min_y && b.y < self.min_y)
            || (a.x > self.max_x && b.x > self.max_x)
            || (a.x < self.min_x && b.x < self.min_x)
    }

    /// Default overlap margin between split pieces, in output units.
    pub fn default_bbox_overlap(&self) -> f64 {
        if self.is_wgs84() {
            0.0001
        } else {
            10.0
        }
    }

    pub fn transform(&self, coord: Coord) -> Result<Coord, FatalError> {
        let projected = self.projection.project(coord);
        if projected.x.is_finite() && projected.y.is_finite() {
            Ok(projected)
        } else {
            Err(FatalError::Transform {
                epsg: self.epsg,
                x: coord.x,
                y: coord.y,
            })
        }
    }
}

impl fmt::Debug for Srs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Srs")
            .field("epsg", &self.epsg)
            .field("extent", &self.extent)
            .finish()
    }
}

/// Knobs of the two recursive partitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionConfig {
    /// Split polygons with more exterior points than this, 0 disables.
    pub max_points: usize,

    /// Margin by which split rectangles overlap, in output units.
    pub bbox_overlap: f64,

    /// A split is abandoned when the margin reaches this share of the span
    /// being split.
    pub split_abort_ratio: f64,

    /// The water partition subtracts land directly once fewer polygons than
    /// this are left.
    pub water_leaf_size: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_points: 1000,
            bbox_overlap: 0.0001,
            split_abort_ratio: 0.25,
            water_leaf_size: 100,
        }
    }
}
