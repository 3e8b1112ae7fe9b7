//! Concurrent hash scheduler.
//!
//! # Overview
//!
//! The scheduler hashes a flat list of [`Candidate`]s on a dedicated
//! thread pool and groups them by [`ContentKey`]. Work is pull-based:
//! every candidate goes into one shared job channel and each worker takes
//! the next file as soon as it finishes the previous one, so a single
//! large file on slow media never leaves other workers idle.
//!
//! Workers never touch the grouping. Each completed file is sent back as
//! a [`HashOutcome`] over a result channel; the calling thread is the only
//! collector and the only writer of the grouping.
//!
//! After collection, every group is sorted by path. The output therefore
//! does not depend on the number of workers or on completion order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use super::groups::{Candidate, ContentKey, Grouping};
use crate::progress::ProgressCallback;
use crate::scanner::{AccessError, Digest, HashMode, Hasher};

/// A single finished unit of work.
#[derive(Debug)]
pub struct HashOutcome {
    /// The file that was hashed
    pub candidate: Candidate,
    /// Its digest, or why it could not be read
    pub result: Result<Digest, AccessError>,
}

/// Statistics from one scheduler run.
#[derive(Debug, Default)]
pub struct HashStats {
    /// Candidates handed to the scheduler
    pub input_files: usize,
    /// Files hashed successfully
    pub hashed_files: usize,
    /// Files that failed with an [`AccessError`]
    pub failed_files: usize,
    /// Files never hashed because shutdown was requested
    pub skipped_files: usize,
    /// Bytes covered by successful digests
    pub bytes_hashed: u64,
    /// Access errors, one per failed file
    pub errors: Vec<AccessError>,
    /// Whether the run stopped early on shutdown
    pub interrupted: bool,
}

/// Name reported to progress callbacks for a hash mode.
#[must_use]
pub fn phase_name(mode: HashMode) -> &'static str {
    match mode {
        HashMode::Prefix(_) => "prehash",
        HashMode::Full => "fullhash",
    }
}

/// Hashes candidates on a bounded worker pool.
pub struct HashScheduler {
    hasher: Arc<Hasher>,
    pool: rayon::ThreadPool,
    worker_count: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for HashScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashScheduler")
            .field("hasher", &self.hasher)
            .field("worker_count", &self.worker_count)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl HashScheduler {
    /// Create a scheduler with `worker_count` hashing threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be built.
    pub fn new(
        hasher: Arc<Hasher>,
        worker_count: usize,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let worker_count = worker_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("hash-worker-{i}"))
            .build()?;

        Ok(Self {
            hasher,
            pool,
            worker_count,
            shutdown_flag: None,
            progress_callback: None,
        })
    }

    /// Set the shutdown flag checked before each file.
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

    /// Number of hashing threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The hasher used for every file.
    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash every candidate in `mode` and group the results.
    ///
    /// Blocks until every worker has finished. Files that fail with an
    /// [`AccessError`] are left out of the grouping and counted in the
    /// stats. The grouping is not reduced.
    ///
    /// # Arguments
    ///
    /// * `candidates` - Files to hash, tagged with their stage-0 key
    /// * `mode` - Prefix or full hashing
    #[must_use]
    pub fn run(
        &self,
        candidates: Vec<Candidate>,
        mode: HashMode,
    ) -> (Grouping<ContentKey>, HashStats) {
        let mut stats = HashStats {
            input_files: candidates.len(),
            ..Default::default()
        };
        let mut grouping = Grouping::new();

        if candidates.is_empty() {
            log::debug!("{}: No files to process", phase_name(mode));
            return (grouping, stats);
        }

        let phase = phase_name(mode);
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(phase, candidates.len());
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Candidate>();
        for candidate in candidates {
            // The receiver is alive until the end of this function
            let _ = job_tx.send(candidate);
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<HashOutcome>();
        let workers = self.worker_count.min(stats.input_files);
        log::debug!(
            "{}: Hashing {} files with {} workers",
            phase,
            stats.input_files,
            workers
        );

        self.pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| self.work(&job_rx, &result_tx, mode));
            }
            drop(result_tx);

            let mut completed = 0usize;
            for outcome in &result_rx {
                completed += 1;
                if let Some(ref callback) = self.progress_callback {
                    callback.on_progress(completed, &outcome.candidate.file.path.to_string_lossy());
                }
                self.collect(outcome, &mut grouping, &mut stats);
            }
        });

        stats.skipped_files = job_rx.len();
        stats.interrupted = stats.skipped_files > 0 || self.is_shutdown_requested();
        if stats.interrupted {
            log::info!(
                "{}: Interrupted by shutdown signal, {} files not hashed",
                phase,
                stats.skipped_files
            );
        }

        grouping.sort_members();

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(phase);
        }

        (grouping, stats)
    }

    /// Worker loop: pull until the job channel drains or shutdown is requested.
    fn work(&self, jobs: &Receiver<Candidate>, results: &Sender<HashOutcome>, mode: HashMode) {
        while !self.is_shutdown_requested() {
            let Ok(candidate) = jobs.try_recv() else {
                break;
            };

            let result = self.hasher.hash_file(&candidate.file, mode);
            if results.send(HashOutcome { candidate, result }).is_err() {
                break;
            }
        }
    }

    /// Merge one outcome into the grouping. Runs on the collecting thread only.
    fn collect(
        &self,
        outcome: HashOutcome,
        grouping: &mut Grouping<ContentKey>,
        stats: &mut HashStats,
    ) {
        let HashOutcome { candidate, result } = outcome;
        match result {
            Ok(digest) => {
                stats.hashed_files += 1;
                stats.bytes_hashed += candidate.file.size;
                if let Some(ref callback) = self.progress_callback {
                    callback.on_item_completed(candidate.file.size);
                }
                log::trace!("Hashed {}: {}", candidate.file.path.display(), digest);
                let key = ContentKey {
                    meta: candidate.meta,
                    digest,
                };
                grouping.insert(key, candidate.file);
            }
            Err(e) => {
                log::warn!("Skipping unreadable file: {}", e);
                stats.failed_files += 1;
                stats.errors.push(e);
            }
        }
    }
}
