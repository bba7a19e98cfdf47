//! Sharded scan orchestration.
//!
//! # Overview
//!
//! [`DuplicateFinder`] runs one scan across `N` workers:
//! 1. **Validate** - the root must be an existing directory; nothing is
//!    spawned otherwise
//! 2. **Distribute** - rank 0 broadcasts the [`ScanRequest`]; every rank walks
//!    the tree and keeps the files it owns
//! 3. **Aggregate** - each rank fingerprints its shard into a [`LocalIndex`]
//! 4. **Merge** - workers ship their index to rank 0 as frames
//! 5. **Select** - rank 0 extracts the duplicate groups
//!
//! Ranks `1..N` run on named scoped threads; rank 0 runs on the calling
//! thread. Threads share nothing but the shutdown flag and the progress sink.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_workers(4));
//! let (groups, summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! println!("{} duplicate groups in {} files", groups.len(), summary.total_files);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{aggregate_shard, select_duplicates, DuplicateGroup, GlobalIndex, LocalIndex, ShardStats};
use crate::cluster::{
    broadcast_request, fabric, gather_global_index, receive_request, send_local_index,
    CoordinatorLink, ProtocolError, ScanRequest, WorkerLink, DEFAULT_CHANNEL_CAPACITY,
};
use crate::progress::{ProgressCallback, PHASE_FINGERPRINT};
use crate::scanner::{
    validate_root, Fingerprinter, ScanError, Shard, Walker, WalkerConfig, DEFAULT_BUFFER_SIZE,
};

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of workers, coordinator included (at least 1).
    pub workers: usize,
    /// Read buffer size used when fingerprinting.
    pub buffer_size: usize,
    /// Frames buffered per worker channel.
    pub channel_capacity: usize,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Destination for relocated duplicates, broadcast with the request.
    pub destination: Option<PathBuf>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("workers", &self.workers)
            .field("buffer_size", &self.buffer_size)
            .field("channel_capacity", &self.channel_capacity)
            .field("walker_config", &self.walker_config)
            .field("destination", &self.destination)
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
            workers: 1,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            walker_config: WalkerConfig::default(),
            destination: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the fingerprint read buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the per-channel frame capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the relocation destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Option<PathBuf>) -> Self {
        self.destination = destination;
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

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Regular files enumerated across all shards
    pub total_files: usize,
    /// Files present in the global index
    pub indexed_files: usize,
    /// Files that could not be fingerprinted
    pub skipped_files: usize,
    /// Traversal errors (unreadable directories, ...)
    pub walk_errors: usize,
    /// Distinct fingerprints in the global index
    pub unique_fingerprints: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies (group size minus the one kept, summed)
    pub duplicate_files: usize,
    /// Workers that took part, coordinator included
    pub workers: usize,
    /// Wall-clock duration of the scan phase
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Check whether any file or directory was left out of the scan.
    #[must_use]
    pub fn has_skipped(&self) -> bool {
        self.skipped_files > 0 || self.walk_errors > 0
    }

    fn from_merge(
        global: &GlobalIndex,
        groups: &[DuplicateGroup],
        shards: &[ShardStats],
        workers: usize,
        scan_duration: Duration,
    ) -> Self {
        let total_files = shards.iter().map(|s| s.assigned_files).sum();
        let indexed_files = global.file_count();
        Self {
            total_files,
            indexed_files,
            skipped_files: total_files.saturating_sub(indexed_files),
            walk_errors: shards.iter().map(|s| s.walk_errors).sum(),
            unique_fingerprints: global.len(),
            duplicate_groups: groups.len(),
            duplicate_files: groups.iter().map(DuplicateGroup::duplicate_count).sum(),
            workers,
            scan_duration,
        }
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root could not be inspected.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Frames could not be exchanged between workers.
    #[error("Merge failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// A worker thread failed or could not be started.
    #[error("Worker {rank} failed: {message}")]
    WorkerFailed {
        /// Rank of the failed worker
        rank: usize,
        /// What went wrong
        message: String,
    },
}

/// Duplicate finder that runs a sharded scan.
pub struct DuplicateFinder {
    config: FinderConfig,
    fingerprinter: Fingerprinter,
}

/// What rank 0 hands back once the merge is done.
struct CoordinatorOutcome {
    global: GlobalIndex,
    stats: ShardStats,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let fingerprinter = Fingerprinter::new().with_buffer_size(config.buffer_size);
        Self {
            config,
            fingerprinter,
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Find all duplicate files under `path`.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The path does not exist or is not a directory
    /// - A worker fails or frames cannot be exchanged
    /// - The scan is interrupted by shutdown signal
    pub fn find_duplicates(
        &self,
        path: &Path,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();

        validate_root(path).map_err(|e| match e {
            ScanError::NotFound(p) => FinderError::PathNotFound(p),
            ScanError::NotADirectory(p) => FinderError::NotADirectory(p),
            other => FinderError::Scan(other),
        })?;

        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let size = self.config.workers.max(1);
        log::info!(
            "Starting duplicate scan of {} with {} worker{}",
            path.display(),
            size,
            if size == 1 { "" } else { "s" }
        );

        let request = ScanRequest::new(path.to_path_buf(), self.config.destination.clone());
        let (coordinator, workers) = fabric(size, self.config.channel_capacity);

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_FINGERPRINT, 0);
        }

        let (outcome, worker_results) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers.len());
            let mut spawn_failures = Vec::new();

            for link in workers {
                let rank = link.rank();
                let spawned = thread::Builder::new()
                    .name(format!("dupsweep-worker-{}", rank))
                    .spawn_scoped(scope, move || self.run_worker(link));
                match spawned {
                    Ok(handle) => handles.push((rank, handle)),
                    Err(e) => {
                        log::error!("Failed to start worker {}: {}", rank, e);
                        spawn_failures.push((
                            rank,
                            Err(FinderError::WorkerFailed {
                                rank,
                                message: e.to_string(),
                            }),
                        ));
                    }
                }
            }

            // Consumes the coordinator link, so blocked workers see a
            // disconnect as soon as rank 0 gives up.
            let outcome = self.run_coordinator(coordinator, &request);

            let mut results: Vec<(usize, Result<ShardStats, FinderError>)> = handles
                .into_iter()
                .map(|(rank, handle)| {
                    let result = handle.join().unwrap_or_else(|panic| {
                        Err(FinderError::WorkerFailed {
                            rank,
                            message: panic_message(panic.as_ref()),
                        })
                    });
                    (rank, result)
                })
                .collect();
            results.extend(spawn_failures);
            results.sort_by_key(|(rank, _)| *rank);
            (outcome, results)
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_FINGERPRINT);
        }

        if self.config.is_shutdown_requested() {
            log::info!("Scan interrupted after {:.2?}", start_time.elapsed());
            return Err(FinderError::Interrupted);
        }

        let outcome = self.settle(outcome, worker_results)?;
        let (outcome, mut shard_stats) = outcome;
        shard_stats.insert(0, outcome.stats);

        let groups = select_duplicates(&outcome.global);
        let scan_duration = start_time.elapsed();
        let summary =
            ScanSummary::from_merge(&outcome.global, &groups, &shard_stats, size, scan_duration);

        log::info!(
            "Scan complete in {:.2?}: {} files, {} fingerprints, {} duplicate groups",
            scan_duration,
            summary.total_files,
            summary.unique_fingerprints,
            summary.duplicate_groups
        );
        if summary.skipped_files > 0 {
            log::warn!("{} files could not be fingerprinted", summary.skipped_files);
        }

        Ok((groups, summary))
    }

    /// Combine rank 0's outcome with the joined workers, picking the most
    /// specific error.
    fn settle(
        &self,
        outcome: Result<CoordinatorOutcome, FinderError>,
        worker_results: Vec<(usize, Result<ShardStats, FinderError>)>,
    ) -> Result<(CoordinatorOutcome, Vec<ShardStats>), FinderError> {
        let mut stats = Vec::with_capacity(worker_results.len());
        let mut first_failure = None;

        for (rank, result) in worker_results {
            match result {
                Ok(s) => stats.push(s),
                Err(e) => {
                    log::error!("Worker {} failed: {}", rank, e);
                    if first_failure.is_none() {
                        first_failure = Some((rank, e));
                    }
                }
            }
        }

        match (outcome, first_failure) {
            (Ok(outcome), None) => Ok((outcome, stats)),
            // A lost link is only a symptom; report the worker's own error
            (Err(FinderError::Protocol(ProtocolError::Disconnected { .. })), Some((rank, e)))
            | (Ok(_), Some((rank, e))) => Err(match e {
                FinderError::WorkerFailed { .. } => e,
                other => FinderError::WorkerFailed {
                    rank,
                    message: other.to_string(),
                },
            }),
            (Err(e), _) => Err(e),
        }
    }

    fn walker(&self, root: &Path) -> Walker {
        let walker = Walker::new(root, self.config.walker_config.clone());
        match self.config.shutdown_flag {
            Some(ref flag) => walker.with_shutdown_flag(flag.clone()),
            None => walker,
        }
    }

    fn aggregate(&self, root: &Path, shard: Shard) -> (LocalIndex, ShardStats) {
        let walker = self.walker(root);
        aggregate_shard(
            shard.rank,
            walker.shard(shard),
            &self.fingerprinter,
            self.config.progress_callback.as_deref(),
        )
    }

    fn run_coordinator(
        &self,
        link: CoordinatorLink,
        request: &ScanRequest,
    ) -> Result<CoordinatorOutcome, FinderError> {
        broadcast_request(&link, request)?;

        let (local, stats) = self.aggregate(&request.root, Shard::new(0, link.size()));
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let global =
            gather_global_index(&link, local, self.config.progress_callback.as_deref())?;
        Ok(CoordinatorOutcome { global, stats })
    }

    fn run_worker(&self, link: WorkerLink) -> Result<ShardStats, FinderError> {
        let request = receive_request(&link)?;
        log::debug!(
            "Worker {}/{} scanning {}",
            link.rank(),
            link.size(),
            request.root.display()
        );

        let (local, stats) = self.aggregate(&request.root, Shard::new(link.rank(), link.size()));
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        send_local_index(&link, &local)?;
        Ok(stats)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
