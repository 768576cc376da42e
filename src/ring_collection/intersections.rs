use super::RingCollection;
use crate::error::FatalError;
use crate::location::Location;
use crate::output::{ErrorCategory, OutputSink};
use geo::{LineString, Point};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// An undirected segment, stored with the smaller endpoint first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Segment {
    first: Location,
    second: Location,
}

impl Segment {
    fn new(a: Location, b: Location) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    fn y_range_overlaps(&self, other: &Segment) -> bool {
        let (tmin, tmax) = min_max(self.first.y(), self.second.y());
        let (omin, omax) = min_max(other.first.y(), other.second.y());
        tmin <= omax && omin <= tmax
    }

    fn shares_endpoint(&self, other: &Segment) -> bool {
        self.first == other.first
            || self.first == other.second
            || self.second == other.first
            || self.second == other.second
    }

    /// Crossing point of two segments. Segments touching at an endpoint do
    /// not count.
    fn intersection(&self, other: &Segment) -> Option<Point> {
        if self.shares_endpoint(other) {
            return None;
        }

        let (x1, y1) = (self.first.lon(), self.first.lat());
        let (x2, y2) = (self.second.lon(), self.second.lat());
        let (x3, y3) = (other.first.lon(), other.first.lat());
        let (x4, y4) = (other.second.lon(), other.second.lat());

        let denom = (y4 - y3) * (x2 - x1) - (x4 - x3) * (y2 - y1);
        if denom == 0.0 {
            return None;
        }

        let nume_a = (x4 - x3) * (y1 - y3) - (y4 - y3) * (x1 - x3);
        let nume_b = (x2 - x1) * (y1 - y3) - (y2 - y1) * (x1 - x3);

        let within = if denom > 0.0 {
            (0.0..=denom).contains(&nume_a) && (0.0..=denom).contains(&nume_b)
        } else {
            (denom..=0.0).contains(&nume_a) && (denom..=0.0).contains(&nume_b)
        };
        if !within {
            return None;
        }

        let ua = nume_a / denom;
        Some(Point::new(x1 + ua * (x2 - x1), y1 + ua * (y2 - y1)))
    }

    fn linestring(&self) -> LineString {
        LineString::from(vec![self.first.coord(), self.second.coord()])
    }
}

fn min_max(a: i32, b: i32) -> (i32, i32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Binary dump of all segments: four little-endian `i32` per segment, the
/// fixed-point x/y of the first and then the second endpoint.
pub struct SegmentWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SegmentWriter {
    pub fn create(path: &Path) -> Result<Self, FatalError> {
        let file = File::create(path).map_err(|source| FatalError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn write_segments(&mut self, segments: &[Segment]) -> Result<(), FatalError> {
        self.write_all(segments).map_err(|source| FatalError::Output {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&mut self, segments: &[Segment]) -> io::Result<()> {
        for segment in segments {
            for value in [
                segment.first.x(),
                segment.first.y(),
                segment.second.x(),
                segment.second.y(),
            ] {
                self.writer.write_all(&value.to_le_bytes())?;
            }
        }
        self.writer.flush()
    }
}

impl RingCollection {
    /// Looks for segments used twice and for segments crossing each other.
    ///
    /// Segments are sorted by their smaller endpoint, so the inner scan can
    /// stop at the first segment starting right of the current one. Returns
    /// the number of overlaps plus intersections found.
    pub fn check_for_intersections(
        &self,
        output: &mut dyn OutputSink,
        segment_writer: Option<&mut SegmentWriter>,
    ) -> Result<u32, FatalError> {
        log::debug!("Setting up segments...");
        let mut segments: Vec<Segment> = self
            .rings()
            .flat_map(|ring| ring.segments())
            .map(|(a, b)| Segment::new(a, b))
            .collect();

        log::debug!("Sorting {} segments...", segments.len());
        segments.sort_unstable();

        if let Some(writer) = segment_writer {
            log::debug!("Writing segments to file...");
            writer.write_segments(&segments)?;
        }

        if segments.len() < 2 {
            return Ok(0);
        }

        log::debug!("Finding intersections...");
        let mut overlaps: u32 = 0;
        let mut intersections: Vec<Point> = Vec::new();

        for (i, s1) in segments.iter().enumerate() {
            for s2 in &segments[i + 1..] {
                if s1 == s2 {
                    output.add_error_line(s1.linestring(), ErrorCategory::Overlap, None);
                    overlaps += 1;
                    continue;
                }
                if s2.first.x() > s1.second.x() {
                    break;
                }
                if s1.y_range_overlaps(s2) {
                    if let Some(point) = s1.intersection(s2) {
                        intersections.push(point);
                    }
                }
            }
        }

        let found = intersections.len() as u32 + overlaps;
        for point in intersections {
            output.add_error_point(point, ErrorCategory::Intersection, None);
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{located_fragment, MemoryOutput};
    use std::fs;

    #[test]
    fn test_shared_edge_is_one_overlap() {
        let mut collection = RingCollection::new();
        collection.add_way(&located_fragment(
            1,
            &[(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 1.0, 1.0), (4, 0.0, 1.0), (1, 0.0, 0.0)],
        ));
        // neighbour to the east, sharing the edge (1,0)-(1,1) in the other direction
        collection.add_way(&located_fragment(
            2,
            &[(3, 1.0, 1.0), (2, 1.0, 0.0), (5, 2.0, 0.0), (6, 2.0, 1.0), (3, 1.0, 1.0)],
        ));

        let mut output = MemoryOutput::default();
        let found = collection.check_for_intersections(&mut output, None).unwrap();
        assert_eq!(found, 1);
        assert_eq!(output.count_lines(ErrorCategory::Overlap), 1);
        assert_eq!(output.count_points(ErrorCategory::Intersection), 0);
    }

    #[test]
    fn test_crossing_segments() {
        let mut collection = RingCollection::new();
        collection.add_way(&located_fragment(1, &[(1, 0.0, 0.0), (2, 2.0, 2.0)]));
        collection.add_way(&located_fragment(2, &[(3, 0.0, 2.0), (4, 2.0, 0.0)]));
        collection.add_way(&located_fragment(3, &[(5, 5.0, 5.0), (6, 6.0, 6.0)]));

        let mut output = MemoryOutput::default();
        let found = collection.check_for_intersections(&mut output, None).unwrap();
        assert_eq!(found, 1);

        let (point, category, _) = &output.error_points[0];
        assert_eq!(*category, ErrorCategory::Intersection);
        assert!((point.x() - 1.0).abs() < 1e-9);
        assert!((point.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_touching_segments_do_not_count() {
        let segment_a = Segment::new(Location::new(0.0, 0.0), Location::new(1.0, 1.0));
        let segment_b = Segment::new(Location::new(1.0, 1.0), Location::new(2.0, 0.0));
        assert!(segment_a.intersection(&segment_b).is_none());

        let parallel = Segment::new(Location::new(0.0, 1.0), Location::new(1.0, 2.0));
        assert!(segment_a.intersection(&parallel).is_none());
    }

    #[test]
    fn test_segment_dump() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("segments.bin");

        let mut collection = RingCollection::new();
        collection.add_way(&located_fragment(1, &[(1, 2.0, 1.0), (2, 1.0, 3.0), (3, 0.0, 0.0)]));

        let mut writer = SegmentWriter::create(&path).unwrap();
        collection
            .check_for_intersections(&mut MemoryOutput::default(), Some(&mut writer))
            .unwrap();
        drop(writer);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 2 * 16);

        let values: Vec<i32> = bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        // sorted, smaller endpoint first
        assert_eq!(&values[..4], &[0, 0, 10_000_000, 30_000_000]);
        assert_eq!(&values[4..], &[10_000_000, 30_000_000, 20_000_000, 10_000_000]);
    }
}
