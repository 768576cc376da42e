use crate::stats::{RETURN_CODE_ERROR, RETURN_CODE_FATAL};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort the whole run.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to read input file '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse input file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("there are {0} locations missing, check that the input file contains all nodes needed")]
    MissingLocations(usize),

    #[error("unknown SRS '{0}', currently only 4326 (WGS84) and 3857 (Web Mercator) are supported")]
    UnsupportedSrs(String),

    #[error("transforming coordinate ({x}, {y}) to EPSG:{epsg} failed")]
    Transform { epsg: u32, x: f64, y: f64 },

    #[error("output file '{path}' already exists (use --overwrite to replace it)")]
    OutputExists { path: PathBuf },

    #[error("writing output '{path}' failed: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FatalError {
    /// Missing input data is reported as an error, everything else is fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::MissingLocations(_) => RETURN_CODE_ERROR,
            _ => RETURN_CODE_FATAL,
        }
    }
}

/// A geometry engine operation that could not produce a result.
///
/// Always recoverable: the caller keeps the geometry it had before the
/// operation.
#[derive(Debug, Error)]
#[error("geometry operation '{operation}' failed: {message}")]
pub struct EngineError {
    pub operation: &'static str,
    pub message: String,
}
