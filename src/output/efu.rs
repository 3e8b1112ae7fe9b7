//! EFU report exporter.
//!
//! Writes every file of every duplicate group as an EFU row, followed by
//! one synthetic row per group that shows up in a file-list viewer as:
//!
//! ```text
//! A:\\                     Files:3 Extra Size: 2.0 KiB
//! ```
//!
//! Sorting the list by size in the viewer keeps each group next to its
//! summary row.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bytesize::ByteSize;

use super::ExportError;
use crate::duplicates::{DuplicateGroup, DuplicateReport};
use crate::efu::{self, EfuRow, ATTRIBUTE_READONLY};
use crate::scanner::FileRef;

/// Start of every summary row's file name.
pub const SUMMARY_PREFIX: &str = r"A:\\";

/// Spaces between the prefix and the group counts.
const SUMMARY_PADDING: usize = 20;

/// EFU exporter for a duplicate report.
pub struct EfuExporter<'a> {
    report: &'a DuplicateReport,
}

impl<'a> EfuExporter<'a> {
    /// Create an exporter for `report`.
    #[must_use]
    pub fn new(report: &'a DuplicateReport) -> Self {
        Self { report }
    }

    /// Build all rows: each group's files, then its summary row.
    ///
    /// Dates and attributes are read from the filesystem now; they are
    /// left blank for files that can no longer be read.
    #[must_use]
    pub fn rows(&self) -> Vec<EfuRow> {
        let mut rows = Vec::with_capacity(self.report.file_count() + self.report.groups.len());
        for group in &self.report.groups {
            rows.extend(group.files.iter().map(file_row));
            rows.push(summary_row(group));
        }
        rows
    }

    /// Write the report to a writer.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Csv`] if writing fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        efu::write_rows(writer, &self.rows())?;
        Ok(())
    }

    /// Write the report to a file, replacing it if it exists.
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
            self.report.groups.len(),
            path.display()
        );
        Ok(())
    }
}

/// Label of a group's summary row.
#[must_use]
pub fn summary_label(group: &DuplicateGroup) -> String {
    format!(
        "{}{} Files:{} Extra Size: {}",
        SUMMARY_PREFIX,
        " ".repeat(SUMMARY_PADDING),
        group.len(),
        ByteSize::b(group.reclaimable)
    )
}

fn summary_row(group: &DuplicateGroup) -> EfuRow {
    EfuRow {
        filename: summary_label(group),
        size: Some(group.size),
        date_modified: None,
        date_created: None,
        attributes: Some(0),
    }
}

fn file_row(file: &FileRef) -> EfuRow {
    let metadata = match fs::metadata(&file.path) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            log_metadata_error(&file.path, &e);
            None
        }
    };

    EfuRow {
        filename: file.path.to_string_lossy().into_owned(),
        size: Some(file.size),
        date_modified: metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(efu::to_filetime),
        date_created: metadata
            .as_ref()
            .and_then(|m| m.created().ok())
            .map(efu::to_filetime),
        attributes: Some(match metadata {
            Some(ref m) if m.permissions().readonly() => ATTRIBUTE_READONLY,
            _ => 0,
        }),
    }
}

fn log_metadata_error(path: &Path, error: &io::Error) {
    log::debug!("No metadata for {} at export: {}", path.display(), error);
}
