//! Report export.
//!
//! - [`efu`]: Everything file list, one row per file plus a summary row per
//!   group
//! - [`json`]: JSON for automation and scripting
//! - [`viewer`]: opening the written report in an external program
//!
//! Export failures never invalidate the computed report; callers log them
//! as warnings and may retry.
//!
//! # Example
//!
//! ```no_run
//! use sizedupe::duplicates::{DuplicateFinder, FinderConfig};
//! use sizedupe::output::EfuExporter;
//! use sizedupe::scanner::Walker;
//! use std::path::{Path, PathBuf};
//!
//! let finder = DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new())).unwrap();
//! let report = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//!
//! EfuExporter::new(&report).write_file(Path::new("result.efu")).unwrap();
//! ```

pub mod efu;
pub mod json;
pub mod viewer;

use std::path::PathBuf;

pub use efu::EfuExporter;
pub use json::JsonOutput;
pub use viewer::launch_viewer;

/// Errors from writing or opening a report.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// The report file could not be created or written.
    #[error("Failed to write report {path}: {source}")]
    Io {
        /// Report path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// EFU rows could not be written.
    #[error("Failed to write EFU rows: {0}")]
    Csv(#[from] csv::Error),

    /// The JSON report could not be written.
    #[error("Failed to write JSON report: {0}")]
    Json(#[from] serde_json::Error),

    /// The viewer process could not be started.
    #[error("Failed to launch viewer '{program}': {source}")]
    ViewerLaunch {
        /// Program that was run
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
