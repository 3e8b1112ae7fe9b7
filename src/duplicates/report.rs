//! The duplicate report built from the terminal grouping.

use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::finder::{PipelineState, Precision};
use super::groups::{GroupKey, Grouping, StageKey};
use crate::scanner::FileRef;

/// A set of files considered duplicates of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Key shared by every file in the group
    pub key: GroupKey,
    /// Size of each file in bytes
    pub size: u64,
    /// Files in the group, sorted by path
    pub files: Vec<FileRef>,
    /// Bytes freed by keeping one copy: `size × (count − 1)`
    pub reclaimable: u64,
}

impl DuplicateGroup {
    /// Create a group from a key and its files.
    #[must_use]
    pub fn new(key: GroupKey, files: Vec<FileRef>) -> Self {
        let size = key.meta().size;
        let reclaimable = size.saturating_mul(files.len().saturating_sub(1) as u64);
        Self {
            key,
            size,
            files,
            reclaimable,
        }
    }

    /// Number of files in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the group has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (all files but one).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Human-readable label for the group key.
    #[must_use]
    pub fn key_label(&self) -> String {
        self.key.to_string()
    }

    /// Paths of all files in the group.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Summary statistics from a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Records returned by the enumeration backend
    pub total_files: usize,
    /// Total size of grouped files in bytes
    pub total_size: u64,
    /// Records outside the configured size range
    pub outside_size_range: usize,
    /// Files still candidates after the metadata stage
    pub meta_candidates: usize,
    /// Files still candidates after the prefix-hash stage, if it ran
    pub prehash_candidates: Option<usize>,
    /// Files dropped because they could not be read
    pub unreadable_files: usize,
    /// Number of duplicate groups reported
    pub duplicate_groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Bytes freed by keeping one copy per group
    pub reclaimable_space: u64,
    /// Time spent enumerating
    #[serde(rename = "enumerate_duration_ms", serialize_with = "as_millis")]
    pub enumerate_duration: Duration,
    /// Time spent in the prefix-hash stage
    #[serde(rename = "prehash_duration_ms", serialize_with = "as_millis")]
    pub prehash_duration: Duration,
    /// Time spent in the full-hash stage
    #[serde(rename = "fullhash_duration_ms", serialize_with = "as_millis")]
    pub fullhash_duration: Duration,
    /// Duration of the whole run
    #[serde(rename = "scan_duration_ms", serialize_with = "as_millis")]
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Percentage of scanned bytes that are redundant copies.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        bytesize::ByteSize::b(self.reclaimable_space).to_string()
    }

    /// Total size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        bytesize::ByteSize::b(self.total_size).to_string()
    }
}

/// The result of a pipeline run.
///
/// Built once from the terminal grouping. Groups are ordered by reclaimable
/// bytes (largest first), then by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    /// Precision the run was asked for
    pub precision: Precision,
    /// State the pipeline stopped in
    pub terminal_state: PipelineState,
    /// Duplicate groups, each with at least two files
    pub groups: Vec<DuplicateGroup>,
    /// Run statistics
    pub summary: ScanSummary,
}

impl DuplicateReport {
    /// Build a report from a reduced terminal grouping.
    ///
    /// Fills the group totals of `summary`.
    #[must_use]
    pub fn from_grouping<K: StageKey>(
        grouping: Grouping<K>,
        precision: Precision,
        terminal_state: PipelineState,
        mut summary: ScanSummary,
    ) -> Self {
        debug_assert!(grouping.is_reduced());

        let mut groups: Vec<DuplicateGroup> = grouping
            .into_groups()
            .map(|(key, files)| DuplicateGroup::new(key.into_group_key(), files))
            .collect();

        groups.sort_by(|a, b| b.reclaimable.cmp(&a.reclaimable).then_with(|| a.key.cmp(&b.key)));

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_space = groups.iter().map(|g| g.reclaimable).sum();

        Self {
            precision,
            terminal_state,
            groups,
            summary,
        }
    }

    /// Check if no duplicates were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of files across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Whether the groups were verified by content hashing.
    #[must_use]
    pub fn is_content_verified(&self) -> bool {
        self.precision != Precision::Metadata
    }
}
