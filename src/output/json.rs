//! JSON output formatter for duplicate reports.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "precision": "full-hash",
//!   "terminal_state": "full-hash-reduced",
//!   "duplicates": [
//!     {
//!       "key": "size=1024 digest=ab12...",
//!       "digest": "ab12...",
//!       "size": 1024,
//!       "reclaimable": 1024,
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "total_files": 100,
//!     "duplicate_groups": 5,
//!     "reclaimable_space": 51200,
//!     "scan_duration_ms": 1234,
//!     "exit_code": 0,
//!     "exit_code_name": "SD000"
//!   }
//! }
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::ExportError;
use crate::duplicates::{DuplicateGroup, DuplicateReport, PipelineState, Precision, ScanSummary};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Group key label
    pub key: String,
    /// Content digest as hex, absent for metadata-only groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// File size in bytes
    pub size: u64,
    /// Bytes freed by keeping one copy
    pub reclaimable: u64,
    /// Paths of all files in the group
    pub files: Vec<String>,
}

impl From<&DuplicateGroup> for JsonDuplicateGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            key: group.key_label(),
            digest: group.key.digest().map(|d| d.to_hex()),
            size: group.size,
            reclaimable: group.reclaimable,
            files: group
                .paths()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Run statistics
    #[serde(flatten)]
    pub scan: ScanSummary,
    /// Reclaimable space, human-readable
    pub reclaimable_display: String,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "SD000")
    pub exit_code_name: String,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Requested precision
    pub precision: Precision,
    /// State the pipeline stopped in
    pub terminal_state: PipelineState,
    /// Duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Run statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create the JSON view of a report.
    ///
    /// # Example
    ///
    /// ```
    /// use sizedupe::duplicates::{DuplicateReport, Grouping, MetaKey, PipelineState, Precision, ScanSummary};
    /// use sizedupe::error::ExitCode;
    /// use sizedupe::output::JsonOutput;
    ///
    /// let report = DuplicateReport::from_grouping(
    ///     Grouping::<MetaKey>::new(),
    ///     Precision::FullHash,
    ///     PipelineState::FullHashReduced,
    ///     ScanSummary::default(),
    /// );
    /// let output = JsonOutput::new(&report, ExitCode::NoDuplicates);
    /// assert!(output.duplicates.is_empty());
    /// ```
    #[must_use]
    pub fn new(report: &DuplicateReport, exit_code: ExitCode) -> Self {
        Self {
            precision: report.precision,
            terminal_state: report.terminal_state,
            duplicates: report.groups.iter().map(JsonDuplicateGroup::from).collect(),
            summary: JsonSummary {
                scan: report.summary.clone(),
                reclaimable_display: report.summary.reclaimable_display(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Serialize to a pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON and a trailing newline to a writer.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(serde_json::Error::io)?;
        Ok(())
    }

    /// Write the JSON report to a file, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the file cannot be created or written.
    pub fn write_file(&self, path: &Path) -> Result<(), ExportError> {
        let file = File::create(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(BufWriter::new(file))?;
        log::info!(
            "Wrote {} groups to {}",
            self.duplicates.len(),
            path.display()
        );
        Ok(())
    }
}
