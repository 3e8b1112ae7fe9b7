//! Scanner module for file enumeration and file hashing.
//!
//! This module provides functionality for:
//! - Enumeration backends (parallel directory walk, indexed search)
//! - Content hashing over a leading prefix or the whole file
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal backend using jwalk
//! - [`index`]: Indexed-search backend (Everything-style file lists)
//! - [`hasher`]: Streaming prefix/full hashing
//!
//! Both backends implement [`EnumerationBackend`] and produce the same
//! [`FileRecord`] stream; the choice only affects speed.
//!
//! # Example
//!
//! ```no_run
//! use sizedupe::scanner::{EnumerationBackend, EnumerationQuery, Walker};
//! use std::path::PathBuf;
//!
//! let backend = Walker::default();
//! let query = EnumerationQuery {
//!     min_size: Some(1024),
//!     ..Default::default()
//! };
//! let records = backend.enumerate(&[PathBuf::from(".")], &query).unwrap();
//! for record in records {
//!     println!("{}: {} bytes", record.file.path.display(), record.file.size);
//! }
//! ```

pub mod hasher;
pub mod index;
pub mod walker;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{Digest, HashAlgorithm, HashMode, Hasher, CHUNK_SIZE, PREFIX_SIZE};
pub use index::{CommandService, EfuListService, IndexBackend, IndexQuery, IndexRecord, IndexService};
pub use walker::Walker;

/// A resolved file observed during enumeration.
///
/// The path is absolute with symbolic links resolved, and the size is the
/// one seen at enumeration time. Later stages only read it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileRef {
    /// Absolute, symlink-resolved path
    pub path: PathBuf,
    /// File size in bytes at enumeration time
    pub size: u64,
}

impl FileRef {
    /// Create a new FileRef.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    /// Final path component, used when file names must match.
    #[must_use]
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

/// One enumeration tuple: `(full_path, size_bytes, [modified_time])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// The resolved file
    pub file: FileRef,
    /// Last modification time, when the backend reports it
    pub modified: Option<SystemTime>,
}

impl FileRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            file: FileRef::new(path, size),
            modified,
        }
    }
}

/// Filters pushed down to an enumeration backend.
///
/// Backends should honor these, but the candidate grouping re-applies the
/// size range so a backend that ignores it stays correct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationQuery {
    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,
    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,
    /// Whether modification times are needed for grouping.
    pub with_modified: bool,
}

impl EnumerationQuery {
    /// Check whether a size lies inside `[min_size, max_size]`.
    #[must_use]
    pub fn accepts_size(&self, size: u64) -> bool {
        self.min_size.is_none_or(|min| size >= min) && self.max_size.is_none_or(|max| size <= max)
    }
}

/// A source of file records under a set of roots.
///
/// Implementations swallow per-file failures (logging them) and only
/// return an error when the backend as a whole cannot produce results.
pub trait EnumerationBackend: Send + Sync {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Enumerate every regular file reachable under `roots`.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError`] if a root is unusable or the backend
    /// is unavailable or returns malformed data.
    fn enumerate(
        &self,
        roots: &[PathBuf],
        query: &EnumerationQuery,
    ) -> Result<Vec<FileRecord>, EnumerationError>;
}

/// Errors that make an enumeration backend unusable for a run.
#[derive(thiserror::Error, Debug)]
pub enum EnumerationError {
    /// The specified root was not found.
    #[error("Path not found: {0}")]
    RootNotFound(PathBuf),

    /// The specified root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The backend could not be reached or refused the query.
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        /// Backend name
        backend: &'static str,
        /// What went wrong
        reason: String,
    },

    /// The backend answered with data that could not be parsed.
    #[error("{backend} backend returned malformed data at line {line}: {reason}")]
    Malformed {
        /// Backend name
        backend: &'static str,
        /// 1-based line of the offending record
        line: u64,
        /// Parser message
        reason: String,
    },

    /// An I/O error occurred while reading backend input.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// A file became unreadable between enumeration and hashing.
///
/// The pipeline never aborts on these: the file is dropped from its group.
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    /// The file was deleted.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when opening or reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file was truncated or grew after it was enumerated.
    #[error("Size changed for {path}: expected {expected} bytes, read {actual}")]
    SizeChanged {
        /// The file
        path: PathBuf,
        /// Bytes expected from the enumerated size
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl AccessError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::PermissionDenied(path) => path,
            Self::SizeChanged { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
