//! Everything file list (`.efu`) format.
//!
//! An EFU file is a comma-separated table with a fixed header:
//!
//! ```text
//! Filename,Size,Date Modified,Date Created,Attributes
//! ```
//!
//! Dates are Windows FILETIME values (100-nanosecond ticks since
//! 1601-01-01 UTC). The same format is read by the index backend and
//! written by the report exporter.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Column names, in order.
pub const COLUMNS: [&str; 5] = ["Filename", "Size", "Date Modified", "Date Created", "Attributes"];

/// FILETIME ticks per second.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_DIFF_SECS: u64 = 11_644_473_600;

/// `FILE_ATTRIBUTE_READONLY`
pub const ATTRIBUTE_READONLY: u32 = 0x1;

/// One row of an EFU table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfuRow {
    /// Full path (or a synthetic label for summary rows)
    #[serde(rename = "Filename")]
    pub filename: String,
    /// Size in bytes
    #[serde(rename = "Size", default)]
    pub size: Option<u64>,
    /// Modification time as FILETIME ticks
    #[serde(rename = "Date Modified", default)]
    pub date_modified: Option<u64>,
    /// Creation time as FILETIME ticks
    #[serde(rename = "Date Created", default)]
    pub date_created: Option<u64>,
    /// Windows attribute bits
    #[serde(rename = "Attributes", default)]
    pub attributes: Option<u32>,
}

/// Convert a `SystemTime` to FILETIME ticks.
///
/// Times before 1601 clamp to zero.
#[must_use]
pub fn to_filetime(time: SystemTime) -> u64 {
    let epoch_ticks = EPOCH_DIFF_SECS * TICKS_PER_SECOND;
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => epoch_ticks.saturating_add(duration_ticks(after)),
        Err(before) => epoch_ticks.saturating_sub(duration_ticks(before.duration())),
    }
}

/// Convert FILETIME ticks to a `SystemTime`.
#[must_use]
pub fn from_filetime(ticks: u64) -> SystemTime {
    let epoch_ticks = EPOCH_DIFF_SECS * TICKS_PER_SECOND;
    if ticks >= epoch_ticks {
        UNIX_EPOCH + ticks_duration(ticks - epoch_ticks)
    } else {
        UNIX_EPOCH - ticks_duration(epoch_ticks - ticks)
    }
}

fn duration_ticks(d: Duration) -> u64 {
    d.as_secs()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(u64::from(d.subsec_nanos() / 100))
}

fn ticks_duration(ticks: u64) -> Duration {
    Duration::new(
        ticks / TICKS_PER_SECOND,
        ((ticks % TICKS_PER_SECOND) * 100) as u32,
    )
}

/// Read all rows from an EFU table.
///
/// Returns the 1-based line and parser message of the first bad record.
pub fn read_rows<R: io::Read>(reader: R) -> Result<Vec<EfuRow>, (u64, String)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| (1, e.to_string()))?;
    if !headers.iter().any(|h| h == COLUMNS[0]) {
        return Err((1, format!("missing '{}' column", COLUMNS[0])));
    }

    let mut rows = Vec::new();
    for result in csv_reader.deserialize::<EfuRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                return Err((line, e.to_string()));
            }
        }
    }
    Ok(rows)
}

/// Write a header and all rows as an EFU table.
///
/// # Errors
///
/// Returns a [`csv::Error`] if serialization or writing fails.
pub fn write_rows<W: io::Write>(writer: W, rows: &[EfuRow]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(COLUMNS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
