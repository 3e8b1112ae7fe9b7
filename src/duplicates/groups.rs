//! Group keys, groupings and the stage reducer.
//!
//! # Overview
//!
//! Every pipeline stage produces a [`Grouping`]: files partitioned by a
//! stage key. Stage 0 keys on cheap metadata ([`MetaKey`]: size, and
//! optionally file name and modification time); the hash stages key on a
//! [`ContentKey`], the stage-0 key plus a content digest.
//!
//! After each stage the grouping is *reduced*: groups with a single file
//! cannot contain duplicates and are dropped.
//!
//! # Example
//!
//! ```
//! use sizedupe::duplicates::{group_by_meta, MetaOptions};
//! use sizedupe::scanner::FileRecord;
//! use std::path::PathBuf;
//!
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, None),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, None),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, None),
//! ];
//!
//! let (grouping, stats) = group_by_meta(records, &MetaOptions::default());
//! let reduced = grouping.reduce();
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(reduced.len(), 1);  // Only the 1024-byte pair survives
//! ```

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Serialize, Serializer};

use crate::scanner::{Digest, FileRecord, FileRef};

/// Stage-0 key: size, plus name and modification time when requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaKey {
    /// File size in bytes
    pub size: u64,
    /// File name, when names must be equal
    pub name: Option<OsString>,
    /// Modification time, when dates must be equal
    pub modified: Option<SystemTime>,
}

impl MetaKey {
    /// Key on size alone.
    #[must_use]
    pub fn size_only(size: u64) -> Self {
        Self {
            size,
            name: None,
            modified: None,
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "size={}", self.size)?;
        if let Some(ref name) = self.name {
            write!(f, " name={}", name.to_string_lossy())?;
        }
        if let Some(modified) = self.modified {
            let datetime: chrono::DateTime<chrono::Utc> = modified.into();
            write!(f, " modified={}", datetime.to_rfc3339())?;
        }
        Ok(())
    }
}

/// Digest-stage key: the stage-0 key the file came from plus its digest.
///
/// Carrying the stage-0 key keeps hash stages from merging files the
/// metadata stage separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    /// Stage-0 key
    pub meta: MetaKey,
    /// Content digest for this stage
    pub digest: Digest,
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} digest={}", self.meta, self.digest)
    }
}

/// Key of a terminal group, as exposed in reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    /// Metadata-only match
    Meta(MetaKey),
    /// Content-verified match
    Content(ContentKey),
}

impl GroupKey {
    /// The stage-0 part of the key.
    #[must_use]
    pub fn meta(&self) -> &MetaKey {
        match self {
            Self::Meta(meta) => meta,
            Self::Content(content) => &content.meta,
        }
    }

    /// The digest, for content-verified groups.
    #[must_use]
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Meta(_) => None,
            Self::Content(content) => Some(&content.digest),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta(meta) => meta.fmt(f),
            Self::Content(content) => content.fmt(f),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A key usable as a pipeline stage key.
pub trait StageKey: Ord + Clone + fmt::Display {
    /// The stage-0 key this key descends from.
    fn meta(&self) -> &MetaKey;

    /// Convert into the report key.
    fn into_group_key(self) -> GroupKey;
}

impl StageKey for MetaKey {
    fn meta(&self) -> &MetaKey {
        self
    }

    fn into_group_key(self) -> GroupKey {
        GroupKey::Meta(self)
    }
}

impl StageKey for ContentKey {
    fn meta(&self) -> &MetaKey {
        &self.meta
    }

    fn into_group_key(self) -> GroupKey {
        GroupKey::Content(self)
    }
}

/// A file queued for hashing, tagged with its stage-0 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Stage-0 key of the group the file belongs to
    pub meta: MetaKey,
    /// The file
    pub file: FileRef,
}

/// Files partitioned by a stage key.
///
/// Every file appears in exactly one group. Group iteration follows key
/// order; order inside a group is insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping<K: Ord> {
    groups: BTreeMap<K, Vec<FileRef>>,
}

impl<K: Ord> Default for Grouping<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: StageKey> Grouping<K> {
    /// Create an empty grouping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the group for `key`.
    pub fn insert(&mut self, key: K, file: FileRef) {
        self.groups.entry(key).or_default().push(file);
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of files across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Files of one group.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&[FileRef]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Iterate over groups in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[FileRef])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Check that every group has at least two files.
    #[must_use]
    pub fn is_reduced(&self) -> bool {
        self.groups.values().all(|files| files.len() >= 2)
    }

    /// Drop every group with fewer than two files.
    ///
    /// Surviving groups are kept as they are; reducing twice is the same as
    /// reducing once.
    #[must_use]
    pub fn reduce(self) -> Self {
        let before = self.groups.len();
        let groups: BTreeMap<K, Vec<FileRef>> = self
            .groups
            .into_iter()
            .filter(|(key, files)| {
                if files.len() < 2 {
                    if let Some(file) = files.first() {
                        log::trace!("Eliminated unique {}: {}", key, file.path.display());
                    }
                    false
                } else {
                    true
                }
            })
            .collect();

        log::trace!("Reduced {} groups to {}", before, groups.len());
        Self { groups }
    }

    /// Sort files inside every group by path.
    pub fn sort_members(&mut self) {
        for files in self.groups.values_mut() {
            files.sort();
        }
    }

    /// Flatten into hashing candidates tagged with their stage-0 key.
    #[must_use]
    pub fn into_candidates(self) -> Vec<Candidate> {
        self.groups
            .into_iter()
            .flat_map(|(key, files)| {
                let meta = key.meta().clone();
                files.into_iter().map(move |file| Candidate {
                    meta: meta.clone(),
                    file,
                })
            })
            .collect()
    }

    /// Consume into `(key, files)` pairs in key order.
    pub fn into_groups(self) -> impl Iterator<Item = (K, Vec<FileRef>)> {
        self.groups.into_iter()
    }
}

impl<K: StageKey> FromIterator<(K, FileRef)> for Grouping<K> {
    fn from_iter<I: IntoIterator<Item = (K, FileRef)>>(iter: I) -> Self {
        let mut grouping = Self::new();
        for (key, file) in iter {
            grouping.insert(key, file);
        }
        grouping
    }
}

/// Reduce a grouping: drop singleton groups.
///
/// Free-function form of [`Grouping::reduce`].
#[must_use]
pub fn reduce<K: StageKey>(grouping: Grouping<K>) -> Grouping<K> {
    grouping.reduce()
}

/// Which metadata must match for files to share a stage-0 group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaOptions {
    /// Include the file name in the key
    pub filename_must_equal: bool,
    /// Include the modification time in the key
    pub modified_date_must_equal: bool,
    /// Minimum file size to include (in bytes)
    pub min_size: Option<u64>,
    /// Maximum file size to include (in bytes)
    pub max_size: Option<u64>,
}

impl MetaOptions {
    /// Check whether a size lies inside `[min_size, max_size]`.
    #[must_use]
    pub fn accepts_size(&self, size: u64) -> bool {
        self.min_size.is_none_or(|min| size >= min) && self.max_size.is_none_or(|max| size <= max)
    }

    /// Build the stage-0 key for a record.
    #[must_use]
    pub fn key_for(&self, record: &FileRecord) -> MetaKey {
        MetaKey {
            size: record.file.size,
            name: if self.filename_must_equal {
                record.file.file_name().map(ToOwned::to_owned)
            } else {
                None
            },
            modified: if self.modified_date_must_equal {
                record.modified
            } else {
                None
            },
        }
    }
}

/// Statistics from stage-0 grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Records received from the backend
    pub total_files: usize,
    /// Total size of grouped files in bytes
    pub total_size: u64,
    /// Records dropped by the size range
    pub outside_size_range: usize,
    /// Records dropped because their resolved path was already seen
    pub repeated_paths: usize,
    /// Distinct stage-0 keys
    pub unique_keys: usize,
}

/// Group enumerated records by their stage-0 key.
///
/// Records outside `[min_size, max_size]` and repeated resolved paths (a
/// symlink enumerated next to its target) are left out, so every file
/// appears in exactly one group. The result is not reduced yet.
#[must_use]
pub fn group_by_meta(
    records: impl IntoIterator<Item = FileRecord>,
    options: &MetaOptions,
) -> (Grouping<MetaKey>, GroupingStats) {
    let mut grouping = Grouping::new();
    let mut stats = GroupingStats::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for record in records {
        stats.total_files += 1;

        if !options.accepts_size(record.file.size) {
            stats.outside_size_range += 1;
            log::trace!(
                "Skipping file due to size filter ({}): {}",
                record.file.size,
                record.file.path.display()
            );
            continue;
        }

        if !seen.insert(record.file.path.clone()) {
            stats.repeated_paths += 1;
            log::debug!("Already enumerated: {}", record.file.path.display());
            continue;
        }

        stats.total_size += record.file.size;
        let key = options.key_for(&record);
        grouping.insert(key, record.file);
    }

    stats.unique_keys = grouping.len();
    (grouping, stats)
}
