//! Pipeline orchestrator.
//!
//! # Overview
//!
//! The finder runs a small state machine:
//!
//! ```text
//! Enumerated → MetaReduced → SmallHashed → SmallHashReduced → FullHashed → FullHashReduced
//! ```
//!
//! 1. **Enumerated**: the backend lists files; they are grouped by size
//!    (and optionally name and modification time)
//! 2. **MetaReduced**: singleton groups are dropped
//! 3. **SmallHashed / SmallHashReduced**: surviving files are hashed over
//!    their first bytes, regrouped and reduced
//! 4. **FullHashed / FullHashReduced**: survivors are hashed in full,
//!    regrouped and reduced
//!
//! The requested [`Precision`] decides which reduced state is terminal.
//! The shutdown flag is checked at every stage boundary; an interrupted
//! run returns [`FinderError::Interrupted`] and never a partial report.
//!
//! # Example
//!
//! ```no_run
//! use sizedupe::duplicates::{DuplicateFinder, FinderConfig, Precision};
//! use sizedupe::scanner::Walker;
//! use std::path::PathBuf;
//!
//! let config = FinderConfig::default()
//!     .with_precision(Precision::FullHash)
//!     .with_worker_count(4);
//! let finder = DuplicateFinder::new(config, Box::new(Walker::new())).unwrap();
//!
//! let report = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//! println!("Found {} duplicate groups", report.groups.len());
//! println!("Reclaimable space: {}", report.summary.reclaimable_display());
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::groups::{group_by_meta, Candidate, ContentKey, Grouping, MetaKey, MetaOptions};
use super::report::{DuplicateReport, ScanSummary};
use super::scheduler::{HashScheduler, HashStats};
use crate::progress::ProgressCallback;
use crate::scanner::{
    EnumerationBackend, EnumerationError, EnumerationQuery, FileRecord, HashMode, Hasher,
};

/// How far the pipeline advances before reporting.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    /// Metadata collisions only, no content read
    #[serde(rename = "none")]
    #[value(name = "none")]
    Metadata,
    /// Verified by a hash of the leading bytes
    SmallHash,
    /// Verified by a hash of the entire content
    #[default]
    FullHash,
}

impl Precision {
    /// The reduced state that ends a run at this precision.
    #[must_use]
    pub fn terminal_state(self) -> PipelineState {
        match self {
            Self::Metadata => PipelineState::MetaReduced,
            Self::SmallHash => PipelineState::SmallHashReduced,
            Self::FullHash => PipelineState::FullHashReduced,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "none"),
            Self::SmallHash => write!(f, "small-hash"),
            Self::FullHash => write!(f, "full-hash"),
        }
    }
}

/// States of the detection pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    /// Files listed and grouped by metadata
    Enumerated,
    /// Metadata groups reduced
    MetaReduced,
    /// Candidates grouped by prefix digest
    SmallHashed,
    /// Prefix groups reduced
    SmallHashReduced,
    /// Candidates grouped by full digest
    FullHashed,
    /// Full-digest groups reduced
    FullHashReduced,
}

impl PipelineState {
    /// The state that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Enumerated => Some(Self::MetaReduced),
            Self::MetaReduced => Some(Self::SmallHashed),
            Self::SmallHashed => Some(Self::SmallHashReduced),
            Self::SmallHashReduced => Some(Self::FullHashed),
            Self::FullHashed => Some(Self::FullHashReduced),
            Self::FullHashReduced => None,
        }
    }

    /// Check if a run at `precision` stops in this state.
    #[must_use]
    pub fn is_terminal(self, precision: Precision) -> bool {
        self == precision.terminal_state() || self.next().is_none()
    }

    /// Check if entering this state reads file content.
    #[must_use]
    pub fn is_hashing(self) -> bool {
        matches!(self, Self::SmallHashed | Self::FullHashed)
    }

    /// Short name used in logs and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Enumerated => "enumerated",
            Self::MetaReduced => "meta-reduced",
            Self::SmallHashed => "small-hashed",
            Self::SmallHashReduced => "small-hash-reduced",
            Self::FullHashed => "full-hashed",
            Self::FullHashReduced => "full-hash-reduced",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of hashing threads.
    /// Default is 4 to prevent disk thrashing.
    pub worker_count: usize,
    /// How far the pipeline advances.
    pub precision: Precision,
    /// Stage-0 key and size range.
    pub meta_options: MetaOptions,
    /// Hasher used by both hash stages.
    pub hasher: Hasher,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("worker_count", &self.worker_count)
            .field("precision", &self.precision)
            .field("meta_options", &self.meta_options)
            .field("hasher", &self.hasher)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            precision: Precision::default(),
            meta_options: MetaOptions::default(),
            hasher: Hasher::new(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers.max(1);
        self
    }

    /// Set how far the pipeline advances.
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the stage-0 key options and size range.
    #[must_use]
    pub fn with_meta_options(mut self, options: MetaOptions) -> Self {
        self.meta_options = options;
        self
    }

    /// Set the hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The filter handed to the enumeration backend.
    #[must_use]
    pub fn enumeration_query(&self) -> EnumerationQuery {
        EnumerationQuery {
            min_size: self.meta_options.min_size,
            max_size: self.meta_options.max_size,
            with_modified: self.meta_options.modified_date_must_equal,
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors that end a pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// No root paths were given.
    #[error("No paths to scan")]
    NoRoots,

    /// The enumeration backend failed.
    #[error("Enumeration failed: {source}")]
    Enumeration {
        /// The backend error
        #[from]
        source: EnumerationError,
    },

    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user before reaching {stage}")]
    Interrupted {
        /// The state the pipeline was about to enter
        stage: PipelineState,
    },

    /// The hashing thread pool could not be built.
    #[error("Failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl FinderError {
    /// Name of the stage that failed.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoRoots | Self::Enumeration { .. } => "enumerate",
            Self::Interrupted { stage } => stage.name(),
            Self::ThreadPool(_) => "setup",
        }
    }
}

/// The grouping carried between states.
enum StageGrouping {
    Meta(Grouping<MetaKey>),
    Content(Grouping<ContentKey>),
}

impl StageGrouping {
    fn reduce(self) -> Self {
        match self {
            Self::Meta(g) => Self::Meta(g.reduce()),
            Self::Content(g) => Self::Content(g.reduce()),
        }
    }

    fn into_candidates(self) -> Vec<Candidate> {
        match self {
            Self::Meta(g) => g.into_candidates(),
            Self::Content(g) => g.into_candidates(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Meta(g) => g.len(),
            Self::Content(g) => g.len(),
        }
    }

    fn file_count(&self) -> usize {
        match self {
            Self::Meta(g) => g.file_count(),
            Self::Content(g) => g.file_count(),
        }
    }
}

/// Duplicate finder that runs the staged detection pipeline.
///
/// The enumeration backend is injected; the finder holds no global state
/// and can be reused for several runs.
pub struct DuplicateFinder {
    config: FinderConfig,
    backend: Box<dyn EnumerationBackend>,
    scheduler: HashScheduler,
}

impl fmt::Debug for DuplicateFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateFinder")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl DuplicateFinder {
    /// Create a finder with the given configuration and enumeration backend.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::ThreadPool`] if the hashing pool cannot be built.
    pub fn new(
        config: FinderConfig,
        backend: Box<dyn EnumerationBackend>,
    ) -> Result<Self, FinderError> {
        let mut scheduler = HashScheduler::new(Arc::new(config.hasher.clone()), config.worker_count)?;
        if let Some(ref flag) = config.shutdown_flag {
            scheduler = scheduler.with_shutdown_flag(flag.clone());
        }
        if let Some(ref callback) = config.progress_callback {
            scheduler = scheduler.with_progress_callback(callback.clone());
        }

        Ok(Self {
            config,
            backend,
            scheduler,
        })
    }

    /// The finder configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Find duplicate files under the given roots.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if:
    /// - `roots` is empty
    /// - The enumeration backend fails
    /// - The run is interrupted by a shutdown signal
    pub fn find_duplicates(&self, roots: &[PathBuf]) -> Result<DuplicateReport, FinderError> {
        if roots.is_empty() {
            return Err(FinderError::NoRoots);
        }
        self.check_shutdown(PipelineState::Enumerated)?;

        let start_time = Instant::now();
        log::info!(
            "Enumerating {} root(s) with the {} backend",
            roots.len(),
            self.backend.name()
        );

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("enumerate", 0);
            callback.on_message(&format!("Enumerating {} root(s)", roots.len()));
        }

        let enumerated = self
            .backend
            .enumerate(roots, &self.config.enumeration_query());

        // The phase ends on failure too, so the spinner stops.
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("enumerate");
        }
        let records = enumerated?;

        let enumerate_duration = start_time.elapsed();
        log::info!(
            "Enumerated {} files in {:.2?}",
            records.len(),
            enumerate_duration
        );

        self.run(records, start_time, enumerate_duration)
    }

    /// Find duplicates among already enumerated records.
    ///
    /// Skips the backend; the records still go through the size range and
    /// the stage-0 grouping.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if a shutdown is requested.
    pub fn find_duplicates_from_records(
        &self,
        records: Vec<FileRecord>,
    ) -> Result<DuplicateReport, FinderError> {
        self.run(records, Instant::now(), Duration::ZERO)
    }

    fn run(
        &self,
        records: Vec<FileRecord>,
        start_time: Instant,
        enumerate_duration: Duration,
    ) -> Result<DuplicateReport, FinderError> {
        let precision = self.config.precision;
        let mut summary = ScanSummary {
            enumerate_duration,
            ..Default::default()
        };

        let (grouping, stats) = group_by_meta(records, &self.config.meta_options);
        summary.total_files = stats.total_files;
        summary.total_size = stats.total_size;
        summary.outside_size_range = stats.outside_size_range;
        log::info!(
            "{}: {} files in {} groups",
            PipelineState::Enumerated,
            grouping.file_count(),
            grouping.len()
        );

        let mut state = PipelineState::Enumerated;
        let mut current = StageGrouping::Meta(grouping);

        while !state.is_terminal(precision) {
            let Some(next) = state.next() else {
                break;
            };
            self.check_shutdown(next)?;

            let stage_start = Instant::now();
            current = self.advance(next, current, &mut summary)?;
            let elapsed = stage_start.elapsed();

            match next {
                PipelineState::SmallHashed => summary.prehash_duration = elapsed,
                PipelineState::FullHashed => summary.fullhash_duration = elapsed,
                PipelineState::MetaReduced => summary.meta_candidates = current.file_count(),
                PipelineState::SmallHashReduced => {
                    summary.prehash_candidates = Some(current.file_count());
                }
                _ => {}
            }

            log::info!(
                "{}: {} files in {} groups ({:.2?})",
                next,
                current.file_count(),
                current.len(),
                elapsed
            );
            state = next;
        }

        summary.scan_duration = start_time.elapsed();

        let report = match current {
            StageGrouping::Meta(g) => DuplicateReport::from_grouping(g, precision, state, summary),
            StageGrouping::Content(g) => {
                DuplicateReport::from_grouping(g, precision, state, summary)
            }
        };

        log::info!(
            "Scan complete at {}: {} duplicate groups, {} duplicate files, {} reclaimable",
            precision,
            report.summary.duplicate_groups,
            report.summary.duplicate_files,
            report.summary.reclaimable_display()
        );

        Ok(report)
    }

    /// Perform the transition into `next`.
    fn advance(
        &self,
        next: PipelineState,
        current: StageGrouping,
        summary: &mut ScanSummary,
    ) -> Result<StageGrouping, FinderError> {
        let mode = match next {
            PipelineState::SmallHashed => self.scheduler.hasher().prefix_mode(),
            PipelineState::FullHashed => HashMode::Full,
            _ => return Ok(current.reduce()),
        };

        let (grouping, stats) = self.scheduler.run(current.into_candidates(), mode);
        self.record_hash_stats(&stats, summary);

        if stats.interrupted {
            return Err(FinderError::Interrupted { stage: next });
        }
        Ok(StageGrouping::Content(grouping))
    }

    fn record_hash_stats(&self, stats: &HashStats, summary: &mut ScanSummary) {
        summary.unreadable_files += stats.failed_files;
        if stats.failed_files > 0 {
            log::info!(
                "{} of {} files could not be read and were excluded",
                stats.failed_files,
                stats.input_files
            );
        }
    }

    fn check_shutdown(&self, stage: PipelineState) -> Result<(), FinderError> {
        if self.config.is_shutdown_requested() {
            log::info!("Shutdown requested, stopping before {}", stage);
            return Err(FinderError::Interrupted { stage });
        }
        Ok(())
    }
}
