use crate::srs::{PartitionConfig, Srs};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which polygon layers to write.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputPolygons {
    Land,
    Water,
    Both,
    None,
}

impl OutputPolygons {
    pub fn land(self) -> bool {
        matches!(self, OutputPolygons::Land | OutputPolygons::Both)
    }

    pub fn water(self) -> bool {
        matches!(self, OutputPolygons::Water | OutputPolygons::Both)
    }

    pub fn any(self) -> bool {
        self != OutputPolygons::None
    }
}

/// Command-line arguments parser
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Overpass JSON file with the coastline ways and their nodes
    pub input: PathBuf,

    /// Directory receiving the GeoJSON layers (required)
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Replace existing layer files
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Close gaps in the coastline smaller than this, 0 to disable
    #[arg(short, long, default_value_t = 1.0)]
    pub close_distance: f64,

    /// Split polygons with more exterior points than this, 0 to disable
    #[arg(short, long, default_value_t = 1000)]
    pub max_points: usize,

    /// Overlap of split polygons, negative picks a default for the SRS
    #[arg(short, long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub bbox_overlap: f64,

    /// Polygon layers to write
    #[arg(short = 'p', long, value_enum, default_value_t = OutputPolygons::Land)]
    pub output_polygons: OutputPolygons,

    /// Write the rings layer
    #[arg(short = 'r', long)]
    pub output_rings: bool,

    /// Write the coastline as lines
    #[arg(short = 'l', long)]
    pub output_lines: bool,

    /// Spatial reference of the output, 4326 (WGS84) or 3857 (Web Mercator)
    #[arg(short, long, default_value = "4326", value_parser = Srs::parse_code)]
    pub srs: u32,

    /// Dump all ring segments into this file
    #[arg(short = 'S', long)]
    pub write_segments: Option<PathBuf>,

    /// Stop splitting a polygon once the overlap reaches this share of its extent
    #[arg(long, default_value_t = 0.25)]
    pub split_abort_ratio: f64,

    /// Number of land polygons below which water is computed directly
    #[arg(long, default_value_t = 100)]
    pub water_leaf_size: usize,

    /// Report progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// The overlap margin, picking the default for `srs` when none was given.
    pub fn bbox_overlap(&self, srs: &Srs) -> f64 {
        if self.bbox_overlap < 0.0 {
            srs.default_bbox_overlap()
        } else {
            self.bbox_overlap
        }
    }

    pub fn partition_config(&self, srs: &Srs) -> PartitionConfig {
        PartitionConfig {
            max_points: self.max_points,
            bbox_overlap: self.bbox_overlap(srs),
            split_abort_ratio: self.split_abort_ratio,
            water_leaf_size: self.water_leaf_size,
        }
    }
}

/// Validates CLI arguments after parsing.
pub fn validate_args(args: &Args) -> Result<(), String> {
    if args.max_points == 0 && args.output_polygons.water() {
        return Err("Can not use --max-points=0 with water polygon output".to_string());
    }

    if args.water_leaf_size == 0 {
        return Err("--water-leaf-size must be at least 1".to_string());
    }

    if !(args.split_abort_ratio > 0.0 && args.split_abort_ratio <= 1.0) {
        return Err(format!(
            "--split-abort-ratio must be in (0, 1], got {}",
            args.split_abort_ratio
        ));
    }

    if args.close_distance < 0.0 {
        return Err("--close-distance must not be negative".to_string());
    }

    if args.output_dir.exists() && !args.output_dir.is_dir() {
        return Err(format!("Output path is not a directory: {}", args.output_dir.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srs::{EPSG_WEB_MERCATOR, EPSG_WGS84};

    #[test]
    fn test_defaults() {
        let cmd = ["osm-coastline", "-o", "out", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert_eq!(args.input, PathBuf::from("coastlines.json"));
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert_eq!(args.close_distance, 1.0);
        assert_eq!(args.max_points, 1000);
        assert_eq!(args.output_polygons, OutputPolygons::Land);
        assert_eq!(args.srs, EPSG_WGS84);
        assert!(!args.overwrite);
        assert!(!args.output_rings);
        assert!(!args.output_lines);
        assert!(args.write_segments.is_none());
        assert!(validate_args(&args).is_ok());

        let srs = Srs::new(args.srs).unwrap();
        assert_eq!(args.partition_config(&srs), PartitionConfig::default());
    }

    #[test]
    fn test_flags() {
        let cmd = [
            "osm-coastline",
            "-o",
            "out",
            "-f",
            "-r",
            "-l",
            "-v",
            "-d",
            "-p",
            "both",
            "-s",
            "3857",
            "-S",
            "segments.bin",
            "coastlines.json",
        ];
        let args = Args::parse_from(cmd.iter());
        assert!(args.overwrite);
        assert!(args.output_rings);
        assert!(args.output_lines);
        assert!(args.verbose);
        assert!(args.debug);
        assert!(args.output_polygons.land() && args.output_polygons.water());
        assert_eq!(args.srs, EPSG_WEB_MERCATOR);
        assert_eq!(args.write_segments, Some(PathBuf::from("segments.bin")));

        let srs = Srs::new(args.srs).unwrap();
        assert_eq!(args.bbox_overlap(&srs), 10.0);
    }

    #[test]
    fn test_explicit_bbox_overlap() {
        let cmd = ["osm-coastline", "-o", "out", "-b", "0.5", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        let srs = Srs::new(args.srs).unwrap();
        assert_eq!(args.bbox_overlap(&srs), 0.5);
    }

    #[test]
    fn test_deprecated_srs_rejected() {
        let cmd = ["osm-coastline", "-o", "out", "-s", "900913", "coastlines.json"];
        assert!(Args::try_parse_from(cmd.iter()).is_err());
    }

    #[test]
    fn test_required_options() {
        let cmd = ["osm-coastline", "coastlines.json"];
        assert!(Args::try_parse_from(cmd.iter()).is_err());

        let cmd = ["osm-coastline", "-o", "out"];
        assert!(Args::try_parse_from(cmd.iter()).is_err());
    }

    #[test]
    fn test_water_needs_max_points() {
        let cmd = ["osm-coastline", "-o", "out", "-m", "0", "-p", "water", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert!(validate_args(&args).is_err());

        let cmd = ["osm-coastline", "-o", "out", "-m", "0", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_partition_limits() {
        let cmd = ["osm-coastline", "-o", "out", "--water-leaf-size", "0", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert!(validate_args(&args).is_err());

        let cmd = ["osm-coastline", "-o", "out", "--split-abort-ratio", "1.5", "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_output_dir_must_be_directory() {
        let tmpfile = tempfile::NamedTempFile::new().unwrap();
        let path = tmpfile.path().to_str().unwrap();
        let cmd = ["osm-coastline", "-o", path, "coastlines.json"];
        let args = Args::parse_from(cmd.iter());
        assert!(validate_args(&args).is_err());
    }
}
