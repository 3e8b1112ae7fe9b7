//! sizedupe - staged duplicate file finder
//!
//! Finds duplicate files across one or more directory trees without hashing
//! every byte of every file. Files are grouped by size (optionally also by
//! name and modification time), then only colliding files are hashed over
//! their first bytes, and only files that still collide are hashed in full.
//!
//! The library entry point is [`duplicates::DuplicateFinder`]; the binary
//! entry point is [`run_app`].

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod efu;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{BackendKind, Cli, ExportFormat};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, DuplicateReport, FinderConfig};
use crate::error::ExitCode;
use crate::output::{EfuExporter, ExportError, JsonOutput};
use crate::scanner::{CommandService, EfuListService, EnumerationBackend, IndexBackend, Walker};

/// Report file name used when `--open` is given without `--output`.
pub const DEFAULT_REPORT_STEM: &str = "result";

/// Run the application with parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the enumeration
/// backend fails, or the run is interrupted. Export and viewer failures
/// are logged as warnings and reported through
/// [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(&cli).context("Failed to load configuration")?;

    if cli.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::Success);
    }

    let handler = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            log::warn!("{}; Ctrl+C will not stop the scan cleanly", e);
            signal::create_handler()
        }
    };
    let shutdown = handler.get_flag();

    let mut finder_config = FinderConfig::default()
        .with_precision(config.precision)
        .with_worker_count(config.worker_count)
        .with_meta_options(config.meta_options())
        .with_hasher(config.hasher())
        .with_shutdown_flag(shutdown.clone());

    if !cli.no_progress && !cli.quiet {
        finder_config =
            finder_config.with_progress_callback(Arc::new(progress::Progress::new(false)));
    }

    let backend = build_backend(&config, shutdown)?;
    let finder = DuplicateFinder::new(finder_config, backend)?;
    let report = finder
        .find_duplicates(&cli.paths)
        .context("Duplicate scan failed")?;

    let mut exit_code = if report.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };
    if report.summary.unreadable_files > 0 {
        log::warn!(
            "{} files could not be read; the report may be incomplete",
            report.summary.unreadable_files
        );
        exit_code = ExitCode::PartialSuccess;
    }

    if let Err(e) = export(&config, &report, exit_code) {
        log::warn!("{}", e);
        exit_code = ExitCode::PartialSuccess;
    }

    print_summary(&report);
    Ok(exit_code)
}

/// Build the enumeration backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the index backend has neither a list nor a command.
pub fn build_backend(
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<Box<dyn EnumerationBackend>> {
    match config.backend {
        BackendKind::Walk => Ok(Box::new(Walker::new().with_shutdown_flag(shutdown))),
        BackendKind::Index => {
            if let Some(ref list) = config.index_list {
                return Ok(Box::new(IndexBackend::new(EfuListService::new(list))));
            }
            let service = CommandService::from_command_line(&config.index_command)
                .context("The index backend needs index_list or index_command")?;
            Ok(Box::new(IndexBackend::new(service)))
        }
    }
}

/// Where the report goes: the configured file, a default file when a
/// viewer must open it, or stdout.
fn report_path(config: &Config) -> Option<PathBuf> {
    config.output.clone().or_else(|| {
        config
            .open_viewer
            .then(|| PathBuf::from(format!("{DEFAULT_REPORT_STEM}.{}", config.format)))
    })
}

/// Write the report and open it when requested.
///
/// # Errors
///
/// Returns the first [`ExportError`]; the report itself stays valid.
pub fn export(
    config: &Config,
    report: &DuplicateReport,
    exit_code: ExitCode,
) -> Result<(), ExportError> {
    let Some(path) = report_path(config) else {
        let stdout = io::stdout();
        return match config.format {
            ExportFormat::Efu => EfuExporter::new(report).write_to(stdout.lock()),
            ExportFormat::Json => JsonOutput::new(report, exit_code).write_to(stdout.lock()),
        };
    };

    write_report(config.format, report, exit_code, &path)?;

    if config.open_viewer {
        output::launch_viewer(config.viewer.as_deref(), &path)?;
    }
    Ok(())
}

fn write_report(
    format: ExportFormat,
    report: &DuplicateReport,
    exit_code: ExitCode,
    path: &Path,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Efu => EfuExporter::new(report).write_file(path),
        ExportFormat::Json => JsonOutput::new(report, exit_code).write_file(path),
    }
}

fn print_summary(report: &DuplicateReport) {
    let summary = &report.summary;
    let _ = writeln!(
        io::stderr(),
        "{} duplicate groups ({} redundant files, {} reclaimable) at precision {} in {:.2?}",
        summary.duplicate_groups,
        summary.duplicate_files,
        summary.reclaimable_display(),
        report.precision,
        summary.scan_duration
    );
}
