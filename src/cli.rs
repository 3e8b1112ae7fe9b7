//! Command-line interface definitions for sizedupe.
//!
//! Every option here can also come from the config file or from
//! `SIZEDUPE_*` environment variables; flags given on the command line win.
//!
//! # Example
//!
//! ```bash
//! # Content-verified duplicates under two trees, exported as EFU
//! sizedupe ~/Photos /mnt/backup/Photos -o dupes.efu
//!
//! # Same size and same name only, no content read
//! sizedupe ~/Downloads --precision none --filename-must-equal
//!
//! # Skip small files and open the report when done
//! sizedupe ~/Videos --min-size 10MB --open
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::duplicates::Precision;
use crate::scanner::HashAlgorithm;

/// Find duplicate files by size, then by prefix hash, then by full hash.
///
/// Files are grouped by size (and optionally name and modification time);
/// only files that still collide are hashed, first over their leading
/// bytes and then in full.
#[derive(Debug, Parser)]
#[command(name = "sizedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to scan
    #[arg(value_name = "PATH", required_unless_present = "dump_config")]
    pub paths: Vec<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// How far to verify candidates (none = metadata only)
    #[arg(short, long, value_enum, value_name = "LEVEL")]
    pub precision: Option<Precision>,

    /// Only files with the same name can be duplicates
    #[arg(long)]
    pub filename_must_equal: bool,

    /// Only files with the same modification time can be duplicates
    #[arg(long)]
    pub modified_date_must_equal: bool,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Number of hashing threads (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(short = 'j', long = "workers", value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Hash used over the leading bytes of each file
    #[arg(long, value_enum, value_name = "ALGORITHM")]
    pub prefix_algorithm: Option<HashAlgorithm>,

    /// Hash used over the entire content
    #[arg(long, value_enum, value_name = "ALGORITHM")]
    pub full_algorithm: Option<HashAlgorithm>,

    /// How files are listed
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// File list (.efu) exported by a search index, used by the index backend
    #[arg(long, value_name = "FILE")]
    pub index_list: Option<PathBuf>,

    /// Write the report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Open the report in a viewer when done
    #[arg(long)]
    pub open: bool,

    /// Program used by --open instead of the platform default
    #[arg(long, value_name = "PROGRAM")]
    pub viewer: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Print errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

/// How candidate files are listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Recursive filesystem walk
    #[default]
    Walk,
    /// Query a search index (file list or command)
    Index,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Walk => write!(f, "walk"),
            BackendKind::Index => write!(f, "index"),
        }
    }
}

/// Report file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Everything file list, one row per file plus a summary row per group
    #[default]
    Efu,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Efu => write!(f, "efu"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use sizedupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
