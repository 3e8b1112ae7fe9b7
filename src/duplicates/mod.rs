//! Duplicate detection module.
//!
//! This module provides:
//! - Metadata grouping and the stage reducer ([`groups`])
//! - The concurrent hash scheduler ([`scheduler`])
//! - The staged pipeline ([`finder`])
//! - The final report ([`report`])

pub mod finder;
pub mod groups;
pub mod report;
pub mod scheduler;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, PipelineState, Precision};
pub use groups::{
    group_by_meta, reduce, Candidate, ContentKey, GroupKey, Grouping, GroupingStats, MetaKey,
    MetaOptions, StageKey,
};
pub use report::{DuplicateGroup, DuplicateReport, ScanSummary};
pub use scheduler::{HashOutcome, HashScheduler, HashStats};
