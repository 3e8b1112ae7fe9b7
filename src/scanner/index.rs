//! Indexed-search enumeration backend.
//!
//! Instead of walking the filesystem, this backend asks an external file
//! index (such as the Everything search engine) for the files under the
//! roots. Results go through the same resolution and filtering as the
//! walker, so the choice of backend never changes the grouping.
//!
//! Two [`IndexService`] implementations are provided:
//! - [`EfuListService`]: reads an exported `.efu` file list
//! - [`CommandService`]: runs an index query command and parses its
//!   EFU/CSV output

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use super::{EnumerationBackend, EnumerationError, EnumerationQuery, FileRecord};
use crate::efu;

/// Query sent to an index service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    /// Roots whose files are wanted
    pub roots: Vec<PathBuf>,
    /// Size and date filters
    pub filter: EnumerationQuery,
}

/// One hit reported by an index service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Full path as stored in the index
    pub path: PathBuf,
    /// Size, when the index stores it
    pub size: Option<u64>,
    /// Modification time, when the index stores it
    pub modified: Option<SystemTime>,
}

/// An external file index.
pub trait IndexService: Send + Sync {
    /// Run a query.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError::Unavailable`] when the service cannot be
    /// reached and [`EnumerationError::Malformed`] when its answer cannot
    /// be parsed.
    fn query(&self, query: &IndexQuery) -> Result<Vec<IndexRecord>, EnumerationError>;
}

/// Convert parsed EFU rows to index records.
fn rows_to_records(rows: Vec<efu::EfuRow>) -> Vec<IndexRecord> {
    rows.into_iter()
        .filter(|row| !row.filename.is_empty())
        .map(|row| IndexRecord {
            path: PathBuf::from(row.filename),
            size: row.size,
            modified: row.date_modified.map(efu::from_filetime),
        })
        .collect()
}

/// Index service backed by an exported `.efu` file list.
#[derive(Debug, Clone)]
pub struct EfuListService {
    path: PathBuf,
}

impl EfuListService {
    /// Use the file list at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IndexService for EfuListService {
    fn query(&self, _query: &IndexQuery) -> Result<Vec<IndexRecord>, EnumerationError> {
        let file = std::fs::File::open(&self.path).map_err(|e| EnumerationError::Unavailable {
            backend: "index",
            reason: format!("cannot open {}: {}", self.path.display(), e),
        })?;

        let rows = efu::read_rows(std::io::BufReader::new(file)).map_err(|(line, reason)| {
            EnumerationError::Malformed {
                backend: "index",
                line,
                reason,
            }
        })?;

        log::debug!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(rows_to_records(rows))
    }
}

/// Index service that runs a query command.
///
/// The roots are appended to the configured arguments; the command must
/// print an EFU/CSV table with at least a `Filename` column on stdout.
#[derive(Debug, Clone)]
pub struct CommandService {
    program: String,
    args: Vec<String>,
}

impl CommandService {
    /// Build from a command line: program followed by its arguments.
    ///
    /// Returns `None` for an empty command line.
    #[must_use]
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl IndexService for CommandService {
    fn query(&self, query: &IndexQuery) -> Result<Vec<IndexRecord>, EnumerationError> {
        log::debug!("Running index command {} {:?}", self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .args(&query.roots)
            .output()
            .map_err(|e| EnumerationError::Unavailable {
                backend: "index",
                reason: format!("cannot run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(EnumerationError::Unavailable {
                backend: "index",
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let rows = efu::read_rows(output.stdout.as_slice()).map_err(|(line, reason)| {
            EnumerationError::Malformed {
                backend: "index",
                line,
                reason,
            }
        })?;
        Ok(rows_to_records(rows))
    }
}

/// Enumeration backend that delegates to an [`IndexService`].
#[derive(Debug, Clone)]
pub struct IndexBackend<S> {
    service: S,
}

impl<S: IndexService> IndexBackend<S> {
    /// Wrap an index service.
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Resolve one index hit, or `None` if it must be skipped.
    ///
    /// Root membership is decided on where the hit sits, not on where a
    /// symlink points, so a link under a root is kept and recorded as its
    /// target the same way the walker records it.
    fn resolve(
        record: IndexRecord,
        roots: &[PathBuf],
        query: &EnumerationQuery,
    ) -> Option<FileRecord> {
        let location = match hit_location(&record.path) {
            Ok(location) => location,
            Err(e) => {
                log::debug!("Skipping unresolvable index entry {}: {}", record.path.display(), e);
                return None;
            }
        };
        if !roots.iter().any(|root| location.starts_with(root)) {
            return None;
        }

        let path = match std::fs::canonicalize(&location) {
            Ok(path) => path,
            Err(e) => {
                log::debug!("Skipping unresolvable index entry {}: {}", location.display(), e);
                return None;
            }
        };

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }

        let size = record.size.unwrap_or_else(|| metadata.len());
        if !query.accepts_size(size) {
            return None;
        }

        // Index dates are FILETIME ticks; the filesystem time keeps the key
        // identical to the walker's.
        let modified = if query.with_modified {
            metadata.modified().ok()
        } else {
            None
        };

        Some(FileRecord::new(path, size, modified))
    }
}

/// Canonical parent directory joined with the hit's own file name.
fn hit_location(path: &Path) -> std::io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name")
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(std::fs::canonicalize(parent)?.join(name))
}

impl<S: IndexService> EnumerationBackend for IndexBackend<S> {
    fn name(&self) -> &'static str {
        "index"
    }

    fn enumerate(
        &self,
        roots: &[PathBuf],
        query: &EnumerationQuery,
    ) -> Result<Vec<FileRecord>, EnumerationError> {
        let roots = roots
            .iter()
            .map(|root| canonical_root(root))
            .collect::<Result<Vec<_>, _>>()?;

        let hits = self.service.query(&IndexQuery {
            roots: roots.clone(),
            filter: query.clone(),
        })?;
        let total = hits.len();

        let records: Vec<FileRecord> = hits
            .into_iter()
            .filter_map(|hit| Self::resolve(hit, &roots, query))
            .collect();

        log::info!(
            "Index returned {} entries, {} usable under {} root(s)",
            total,
            records.len(),
            roots.len()
        );
        Ok(records)
    }
}

/// Roots are canonicalized so index paths compare against resolved paths.
fn canonical_root(root: &Path) -> Result<PathBuf, EnumerationError> {
    std::fs::canonicalize(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EnumerationError::RootNotFound(root.to_path_buf()),
        _ => EnumerationError::Io {
            path: root.to_path_buf(),
            source: e,
        },
    })
}
