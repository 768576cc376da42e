//! Output layers.
//!
//! The core only talks to an [`OutputSink`]. The GeoJSON writer streams one
//! FeatureCollection per layer so that nothing has to stay in memory after
//! it has been handed over.

use crate::error::FatalError;
use crate::stats::Stats;
use geo::{LineString, Point, Polygon};
use geojson::{Feature, Geometry, JsonObject};
use serde_json::{json, Value};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Vocabulary of the error layers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    TaggedNode,
    SinglePointInRing,
    NotARing,
    NotClosed,
    EndPoint,
    Overlap,
    Intersection,
    FixedEndPoint,
    AddedLine,
    DoubleNode,
    Direction,
    Invalid,
    SelfIntersection,
    Questionable,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::TaggedNode => "tagged_node",
            ErrorCategory::SinglePointInRing => "single_point_in_ring",
            ErrorCategory::NotARing => "not_a_ring",
            ErrorCategory::NotClosed => "not_closed",
            ErrorCategory::EndPoint => "end_point",
            ErrorCategory::Overlap => "overlap",
            ErrorCategory::Intersection => "intersection",
            ErrorCategory::FixedEndPoint => "fixed_end_point",
            ErrorCategory::AddedLine => "added_line",
            ErrorCategory::DoubleNode => "double_node",
            ErrorCategory::Direction => "direction",
            ErrorCategory::Invalid => "invalid",
            ErrorCategory::SelfIntersection => "self_intersection",
            ErrorCategory::Questionable => "questionable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes stored with every ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingRecord {
    pub osm_id: i64,
    pub nways: u32,
    pub npoints: usize,
    pub fixed: bool,
    pub land: bool,
    pub valid: bool,
}

/// Receiver of everything the pipeline produces.
///
/// Adding never fails from the caller's point of view; a sink that cannot
/// write reports it from [`OutputSink::commit`], which ends the run.
pub trait OutputSink {
    fn add_error_point(&mut self, point: Point, category: ErrorCategory, id: Option<i64>);
    fn add_error_line(&mut self, line: LineString, category: ErrorCategory, id: Option<i64>);
    fn add_ring(&mut self, polygon: Polygon, record: RingRecord);
    fn add_land_polygon(&mut self, polygon: Polygon);
    fn add_water_polygon(&mut self, polygon: Polygon);
    fn add_line(&mut self, line: LineString);
    fn commit(&mut self, stats: &Stats) -> Result<(), FatalError>;
}

/// Properties of a feature, from a `json!` object literal.
fn feature_properties(value: Value) -> Option<JsonObject> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

struct Layer {
    path: PathBuf,
    writer: BufWriter<File>,
    features: usize,
}

impl Layer {
    fn create(dir: &Path, name: &str, overwrite: bool) -> Result<Self, FatalError> {
        let path = dir.join(format!("{name}.geojson"));
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let file = options.open(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                FatalError::OutputExists { path: path.clone() }
            } else {
                FatalError::Output {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(b"{\"type\":\"FeatureCollection\",\"features\":[\n")
            .map_err(|source| FatalError::Output {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            writer,
            features: 0,
        })
    }

    fn write_feature(&mut self, geometry: Geometry, properties: Value) -> io::Result<()> {
        if self.features > 0 {
            self.writer.write_all(b",\n")?;
        }
        let feature = Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: feature_properties(properties),
            foreign_members: None,
        };
        serde_json::to_writer(&mut self.writer, &feature)?;
        self.features += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.write_all(b"\n]}\n")?;
        self.writer.flush()
    }
}

/// Writes every layer as a GeoJSON file into one directory.
pub struct GeoJsonOutput {
    dir: PathBuf,
    error_points: Layer,
    error_lines: Layer,
    rings: Layer,
    land_polygons: Layer,
    water_polygons: Layer,
    lines: Layer,

    /// First write failure, reported at commit.
    failure: Option<(PathBuf, io::Error)>,
}

impl GeoJsonOutput {
    pub fn create(dir: &Path, overwrite: bool) -> Result<Self, FatalError> {
        std::fs::create_dir_all(dir).map_err(|source| FatalError::Output {
            path: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            error_points: Layer::create(dir, "error_points", overwrite)?,
            error_lines: Layer::create(dir, "error_lines", overwrite)?,
            rings: Layer::create(dir, "rings", overwrite)?,
            land_polygons: Layer::create(dir, "land_polygons", overwrite)?,
            water_polygons: Layer::create(dir, "water_polygons", overwrite)?,
            lines: Layer::create(dir, "lines", overwrite)?,
            failure: None,
        })
    }

    fn latch(failure: &mut Option<(PathBuf, io::Error)>, layer: &Layer, result: io::Result<()>) {
        if let Err(e) = result {
            if failure.is_none() {
                *failure = Some((layer.path.clone(), e));
            }
        }
    }

    fn write(&mut self, layer: LayerKind, geometry: Geometry, properties: Value) {
        let target = match layer {
            LayerKind::ErrorPoints => &mut self.error_points,
            LayerKind::ErrorLines => &mut self.error_lines,
            LayerKind::Rings => &mut self.rings,
            LayerKind::LandPolygons => &mut self.land_polygons,
            LayerKind::WaterPolygons => &mut self.water_polygons,
            LayerKind::Lines => &mut self.lines,
        };
        let result = target.write_feature(geometry, properties);
        Self::latch(&mut self.failure, target, result);
    }
}

#[derive(Copy, Clone)]
enum LayerKind {
    ErrorPoints,
    ErrorLines,
    Rings,
    LandPolygons,
    WaterPolygons,
    Lines,
}

impl OutputSink for GeoJsonOutput {
    fn add_error_point(&mut self, point: Point, category: ErrorCategory, id: Option<i64>) {
        self.write(
            LayerKind::ErrorPoints,
            Geometry::from(&point),
            json!({ "osm_id": id, "error": category.as_str() }),
        );
    }

    fn add_error_line(&mut self, line: LineString, category: ErrorCategory, id: Option<i64>) {
        self.write(
            LayerKind::ErrorLines,
            Geometry::from(&line),
            json!({ "osm_id": id, "error": category.as_str() }),
        );
    }

    fn add_ring(&mut self, polygon: Polygon, record: RingRecord) {
        self.write(
            LayerKind::Rings,
            Geometry::from(&polygon),
            json!({
                "osm_id": record.osm_id,
                "nways": record.nways,
                "npoints": record.npoints,
                "fixed": record.fixed,
                "land": record.land,
                "valid": record.valid,
            }),
        );
    }

    fn add_land_polygon(&mut self, polygon: Polygon) {
        self.write(LayerKind::LandPolygons, Geometry::from(&polygon), json!({}));
    }

    fn add_water_polygon(&mut self, polygon: Polygon) {
        self.write(LayerKind::WaterPolygons, Geometry::from(&polygon), json!({}));
    }

    fn add_line(&mut self, line: LineString) {
        self.write(LayerKind::Lines, Geometry::from(&line), json!({}));
    }

    fn commit(&mut self, stats: &Stats) -> Result<(), FatalError> {
        for layer in [
            &mut self.error_points,
            &mut self.error_lines,
            &mut self.rings,
            &mut self.land_polygons,
            &mut self.water_polygons,
            &mut self.lines,
        ] {
            let result = layer.finish();
            Self::latch(&mut self.failure, layer, result);
        }

        if let Some((path, source)) = self.failure.take() {
            return Err(FatalError::Output { path, source });
        }

        let meta_path = self.dir.join("meta.json");
        let meta = json!({
            "generator": concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
            "stats": stats,
        });
        File::create(&meta_path)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, &meta)?;
                writer.flush()
            })
            .map_err(|source| FatalError::Output {
                path: meta_path,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};
    use std::fs;

    #[test]
    fn test_layers_are_valid_geojson() {
        let tmpdir = tempfile::tempdir().unwrap();
        let mut output = GeoJsonOutput::create(tmpdir.path(), false).unwrap();

        output.add_error_point(point!(x: 1.0, y: 2.0), ErrorCategory::EndPoint, Some(42));
        output.add_error_line(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            ErrorCategory::Overlap,
            None,
        );
        output.add_land_polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);
        output.commit(&Stats::default()).unwrap();

        let points: Value =
            serde_json::from_str(&fs::read_to_string(tmpdir.path().join("error_points.geojson")).unwrap())
                .unwrap();
        let features = points["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["error"], "end_point");
        assert_eq!(features[0]["properties"]["osm_id"], 42);

        let land: geojson::GeoJson = fs::read_to_string(tmpdir.path().join("land_polygons.geojson"))
            .unwrap()
            .parse()
            .unwrap();
        let geojson::GeoJson::FeatureCollection(collection) = land else {
            panic!("land layer is not a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 1);
        let geometry = collection.features[0].geometry.clone().unwrap();
        let polygon: Polygon<f64> = Polygon::try_from(geometry.value).unwrap();
        assert_eq!(polygon.exterior().0.len(), 4);
        assert!(polygon.interiors().is_empty());

        let water: Value =
            serde_json::from_str(&fs::read_to_string(tmpdir.path().join("water_polygons.geojson")).unwrap())
                .unwrap();
        assert!(water["features"].as_array().unwrap().is_empty());

        let meta: Value =
            serde_json::from_str(&fs::read_to_string(tmpdir.path().join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta["stats"]["ways"], 0);
    }

    #[test]
    fn test_refuses_to_overwrite_without_flag() {
        let tmpdir = tempfile::tempdir().unwrap();
        let mut output = GeoJsonOutput::create(tmpdir.path(), false).unwrap();
        output.commit(&Stats::default()).unwrap();

        assert!(matches!(
            GeoJsonOutput::create(tmpdir.path(), false),
            Err(FatalError::OutputExists { .. })
        ));
        assert!(GeoJsonOutput::create(tmpdir.path(), true).is_ok());
    }
}
