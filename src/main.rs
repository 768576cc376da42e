mod args;
mod coastline_polygons;
mod coastline_ring;
mod error;
mod geometry_engine;
mod location;
mod osm_parser;
mod output;
mod progress;
mod ring_collection;
mod srs;
mod stats;
#[cfg(test)]
mod test_utilities;

use args::{validate_args, Args};
use clap::Parser;
use coastline_polygons::{create_polygons, CoastlinePolygons};
use colored::*;
use error::FatalError;
use geometry_engine::GeoEngine;
use osm_parser::OsmData;
use output::{GeoJsonOutput, OutputSink};
use progress::Steps;
use ring_collection::{RingCollection, SegmentWriter};
use srs::Srs;
use stats::{RunStatus, Stats, RETURN_CODE_CMDLINE, RETURN_CODE_OK};
use std::process;
use tracing_subscriber::filter::LevelFilter;

fn print_banner() {
    let version: &str = env!("CARGO_PKG_VERSION");
    println!("{} version {}", "osm-coastline".bright_white().bold(), version);
}

fn init_logging(args: &Args) {
    let level = if args.debug {
        LevelFilter::DEBUG
    } else if args.verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    // Also installs the bridge that turns `log` records into events.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args: Args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version end up here too
            let code = if e.use_stderr() {
                RETURN_CODE_CMDLINE
            } else {
                RETURN_CODE_OK
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = validate_args(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(RETURN_CODE_CMDLINE);
    }

    init_logging(&args);
    print_banner();

    let code = match run(&args) {
        Ok(status) => {
            println!("There were {} warnings.", status.warnings);
            println!("There were {} errors.", status.errors);
            status.exit_code()
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            e.exit_code()
        }
    };

    process::exit(code);
}

fn run(args: &Args) -> Result<RunStatus, FatalError> {
    let mut status = RunStatus::default();
    let mut stats = Stats::default();

    let srs = Srs::new(args.srs)?;
    let engine = GeoEngine::new();
    let polygons_wanted = args.output_polygons.any();
    let create_wanted = polygons_wanted || args.output_lines;

    let mut steps = Steps::new(
        6 + usize::from(args.output_rings) + usize::from(create_wanted) + usize::from(polygons_wanted),
    );

    let mut output = GeoJsonOutput::create(&args.output_dir, args.overwrite)?;

    steps.next("Reading input file...");
    let data = OsmData::load(&args.input)?;
    log::info!("Read {} nodes and {} ways", data.num_nodes(), data.num_ways());

    steps.next("Reading ways...");
    let mut rings = RingCollection::new();
    status.warn(data.read_ways(&mut rings));
    stats.ways = rings.num_ways();
    stats.unconnected_nodes = rings.num_unconnected_nodes();
    stats.rings = rings.len() as u32;
    stats.rings_from_single_way = rings.num_rings_from_single_way();
    log::info!(
        "There are {} nodes where the coastline is not closed",
        rings.num_unconnected_nodes()
    );
    log::info!(
        "There are {} coastline rings ({} from a single closed way and {} others)",
        stats.rings,
        stats.rings_from_single_way,
        stats.rings - stats.rings_from_single_way
    );

    steps.next("Reading nodes...");
    let locations = rings.setup_locations();
    log::debug!("Looking for the locations of {} nodes", locations.len());
    data.read_nodes(&mut rings, &locations, &mut output);
    drop(locations);
    drop(data);

    let missing = rings.check_locations(args.debug);
    if missing > 0 {
        return Err(FatalError::MissingLocations(missing));
    }
    log::info!("All locations are there");

    steps.next("Checking line segments for intersections and overlaps...");
    let mut segment_writer = args
        .write_segments
        .as_deref()
        .map(SegmentWriter::create)
        .transpose()?;
    status.warn(rings.check_for_intersections(&mut output, segment_writer.as_mut())?);
    drop(segment_writer);

    steps.next("Closing broken rings...");
    if rings.close_antarctica_ring(srs.epsg()) {
        log::info!("Closed Antarctica ring");
    } else {
        log::info!("Did not find open Antarctica ring");
    }

    if args.close_distance > 0.0 {
        rings.close_rings(&mut output, args.close_distance);
        stats.rings_fixed = rings.num_fixed_rings();
        status.error(rings.num_fixed_rings());
        log::info!(
            "Closed {} rings. This left {} nodes where the coastline could not be closed",
            rings.num_fixed_rings(),
            rings.num_unconnected_nodes()
        );
        status.error(rings.num_unconnected_nodes());
    } else {
        log::info!("Not closing broken rings because --close-distance is 0");
    }

    if args.output_rings {
        steps.next("Writing rings...");
        status.warn(rings.output_rings(&engine, &mut output));
    }

    if create_wanted {
        steps.next("Creating polygons...");
        match create_polygons(&rings, &engine, &mut output, &mut status) {
            Ok(land) => {
                let mut polygons = CoastlinePolygons::new(land, &engine, &srs, args.partition_config(&srs));
                stats.land_polygons_before_split = polygons.len() as u32;

                stats.rings_turned_around = polygons.fix_direction(&mut output);
                status.warn(stats.rings_turned_around);
                log::info!("Turned {} polygons around", stats.rings_turned_around);

                if !srs.is_wgs84() {
                    log::info!("Transforming polygons to EPSG:{}", srs.epsg());
                    polygons.transform()?;
                }

                if args.output_lines {
                    polygons.output_lines(&mut output, args.max_points);
                }

                if polygons_wanted {
                    steps.next("Writing polygons...");
                    if srs.is_wgs84() {
                        let questionable = rings.output_questionable(polygons.polygons(), &mut output);
                        status.warn(questionable);
                        log::info!("Found {} questionable rings in input data", questionable);
                    }

                    if args.max_points > 0 {
                        polygons.split();
                        stats.land_polygons_after_split = polygons.len() as u32;
                        log::info!(
                            "Split into {} polygons, maximum depth {}",
                            polygons.len(),
                            polygons.max_split_depth()
                        );
                    }

                    let (warnings, errors) = polygons.check_polygons();
                    status.warn(warnings);
                    status.error(errors);

                    if args.output_polygons.land() {
                        polygons.output_land_polygons(&mut output, args.output_polygons.water());
                    }
                    if args.output_polygons.water() {
                        let written = polygons.output_water_polygons(&mut output);
                        log::info!("Wrote {} water polygons", written);
                    }
                }
            }
            Err(e) => {
                log::error!("{e}");
                status.error(1);
            }
        }
    }

    steps.next("Committing output...");
    output.commit(&stats)?;

    Ok(status)
}
