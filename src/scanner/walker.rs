//! Filesystem walk backend using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] enumeration backend, which walks
//! each root directory and reports every regular file beneath it.
//!
//! # Features
//!
//! - Parallel directory traversal using rayon thread pool
//! - Symlinked files resolved to their target; symlinked directories are
//!   not descended, so link cycles cannot loop
//! - Size filtering (min/max) pushed down from the query
//! - Unreadable entries logged and skipped, never fatal
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use sizedupe::scanner::{EnumerationQuery, Walker};
//! use std::path::Path;
//!
//! let walker = Walker::new();
//! for entry in walker.walk(Path::new("/home/user/Downloads"), &EnumerationQuery::default()) {
//!     match entry {
//!         Ok(record) => println!("{}: {} bytes", record.file.path.display(), record.file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{AccessError, EnumerationBackend, EnumerationError, EnumerationQuery, FileRecord};

/// Directory walker backend for parallel file discovery.
#[derive(Debug, Default, Clone)]
pub struct Walker {
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

/// Counters from one enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Regular files reported
    pub files: usize,
    /// Entries skipped because they could not be read or resolved
    pub skipped: usize,
}

impl Walker {
    /// Create a new walker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops iteration as soon
    /// as possible.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk one root, yielding file records.
    ///
    /// Errors for individual entries are yielded as [`AccessError`] values
    /// rather than stopping iteration.
    pub fn walk<'a>(
        &'a self,
        root: &Path,
        query: &'a EnumerationQuery,
    ) -> impl Iterator<Item = Result<FileRecord, AccessError>> + 'a {
        let root = root.to_path_buf();

        let walk_dir = WalkDir::new(&root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }

                    let path = entry.path();
                    if file_type.is_symlink() {
                        self.resolve_symlink(&path, query)
                    } else {
                        match std::fs::symlink_metadata(&path) {
                            Ok(metadata) => Self::record(path, &metadata, query).map(Ok),
                            Err(e) => Some(Err(Self::handle_io_error(&path, e))),
                        }
                    }
                }
                Err(e) => {
                    let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(AccessError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            }
        })
    }

    /// Resolve a symbolic link to its target file.
    fn resolve_symlink(
        &self,
        link: &Path,
        query: &EnumerationQuery,
    ) -> Option<Result<FileRecord, AccessError>> {
        let target = match std::fs::canonicalize(link) {
            Ok(target) => target,
            Err(e) => {
                log::debug!("Unresolvable symlink {}: {}", link.display(), e);
                return Some(Err(AccessError::from_io(link, e)));
            }
        };

        match std::fs::metadata(&target) {
            Ok(metadata) => {
                log::trace!("Resolved {} -> {}", link.display(), target.display());
                Self::record(target, &metadata, query).map(Ok)
            }
            Err(e) => Some(Err(Self::handle_io_error(&target, e))),
        }
    }

    /// Build a record for a regular file that passes the size filter.
    fn record(path: PathBuf, metadata: &Metadata, query: &EnumerationQuery) -> Option<FileRecord> {
        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        if !query.accepts_size(size) {
            log::trace!(
                "Skipping file due to size filter ({}): {}",
                size,
                path.display()
            );
            return None;
        }

        let modified = if query.with_modified {
            metadata.modified().ok()
        } else {
            None
        };

        Some(FileRecord::new(path, size, modified))
    }

    /// Log and classify an I/O error during file access.
    fn handle_io_error(path: &Path, error: std::io::Error) -> AccessError {
        let error = AccessError::from_io(path, error);
        match error {
            AccessError::NotFound(_) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
            }
            _ => log::warn!("{}", error),
        }
        error
    }

    /// Walk every root, collecting records and counting skipped entries.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError`] if a root is missing or not a directory.
    pub fn enumerate_with_stats(
        &self,
        roots: &[PathBuf],
        query: &EnumerationQuery,
    ) -> Result<(Vec<FileRecord>, WalkStats), EnumerationError> {
        let mut records = Vec::new();
        let mut stats = WalkStats::default();

        for root in roots {
            let root = validate_root(root)?;
            log::debug!("Walking {}", root.display());

            for result in self.walk(&root, query) {
                match result {
                    Ok(record) => {
                        stats.files += 1;
                        records.push(record);
                    }
                    Err(_) => stats.skipped += 1,
                }
            }
        }

        if stats.skipped > 0 {
            log::info!("Skipped {} unreadable entries", stats.skipped);
        }
        Ok((records, stats))
    }
}

impl EnumerationBackend for Walker {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn enumerate(
        &self,
        roots: &[PathBuf],
        query: &EnumerationQuery,
    ) -> Result<Vec<FileRecord>, EnumerationError> {
        self.enumerate_with_stats(roots, query)
            .map(|(records, _)| records)
    }
}

/// Canonicalize a root and make sure it is a directory.
fn validate_root(root: &Path) -> Result<PathBuf, EnumerationError> {
    let canonical = std::fs::canonicalize(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EnumerationError::RootNotFound(root.to_path_buf()),
        _ => EnumerationError::Io {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    if !canonical.is_dir() {
        return Err(EnumerationError::NotADirectory(root.to_path_buf()));
    }
    Ok(canonical)
}
