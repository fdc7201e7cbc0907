//! Offload coordinator - orchestrates discovery and the copy pool
//!
//! The coordinator is responsible for:
//! - Seeding the naming oracle from the target directory
//! - Walking every source root concurrently, failing fast on any walk error
//! - Sorting all discovered files by modification time across roots
//! - Feeding the worker pool and counting results until every item is terminal
//! - Stopping the pool on the first major error or on interrupt
//! - Per-root and global summaries

use crate::config::SlurpConfig;
use crate::content::{FileComparator, FileOps};
use crate::error::{ItemError, Result, SlurpError, WalkError, WorkerError};
use crate::naming::TargetNameOracle;
use crate::pool::{PoolStats, WorkerPool};
use crate::types::WorkItem;
use crate::walker::walk_root;
use crossbeam_channel::RecvTimeoutError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the coordinator rechecks the shutdown flag while draining
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Results for one source root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSummary {
    /// Source root path
    pub root: PathBuf,

    /// Regular files found under the root
    pub located: u64,

    /// Files copied and verified
    pub copied: u64,

    /// Files already present in the target
    pub skipped: u64,

    /// Files that hit a major error
    pub failed: u64,

    /// Verification retries consumed
    pub retries: u64,

    /// Verification mismatch messages, in arrival order
    pub minor_errors: Vec<String>,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default)]
pub struct SlurpSummary {
    /// Total files copied and verified
    pub files_copied: u64,

    /// Total files skipped as already present
    pub files_skipped: u64,

    /// Files that hit a major error (the first one aborts the run)
    pub files_failed: u64,

    /// Total verification retries consumed
    pub retries: u64,

    /// Verification mismatch messages, in arrival order
    pub minor_errors: Vec<String>,

    /// Bytes written by verified copies
    pub bytes_copied: u64,

    /// Files discovered across all roots
    pub files_located: u64,

    /// Per-root breakdown, in the order the roots were given
    pub roots: Vec<RootSummary>,

    /// Wall time of the run
    pub duration: Duration,

    /// Whether every discovered file reached a terminal state
    pub completed: bool,
}

impl SlurpSummary {
    fn new(roots: &[PathBuf]) -> Self {
        Self {
            roots: roots
                .iter()
                .map(|root| RootSummary {
                    root: root.clone(),
                    ..RootSummary::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    fn root_mut(&mut self, root: &Path) -> Option<&mut RootSummary> {
        self.roots.iter_mut().find(|r| r.root == root)
    }

    /// Count one terminal item
    fn record(&mut self, item: &WorkItem) {
        let retries = u64::from(item.retries_used());
        self.retries += retries;
        self.minor_errors.extend_from_slice(item.minor_errors());
        if item.is_copied() {
            self.files_copied += 1;
            self.bytes_copied += item.size;
        } else if item.is_skipped() {
            self.files_skipped += 1;
        } else {
            self.files_failed += 1;
        }

        if let Some(root) = self.root_mut(&item.root) {
            root.retries += retries;
            root.minor_errors.extend_from_slice(item.minor_errors());
            if item.is_copied() {
                root.copied += 1;
            } else if item.is_skipped() {
                root.skipped += 1;
            } else {
                root.failed += 1;
            }
        }
    }

    /// Files counted so far, whatever their outcome
    pub fn files_finished(&self) -> u64 {
        self.files_copied + self.files_skipped + self.files_failed
    }

    /// Any verification mismatch happened during the run
    pub fn has_minor_errors(&self) -> bool {
        !self.minor_errors.is_empty()
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct SlurpProgress {
    /// Files discovered (0 until discovery finishes)
    pub total: u64,

    pub copied: u64,
    pub skipped: u64,
    pub retries: u64,
    pub bytes: u64,

    /// Elapsed time
    pub elapsed: Duration,
}

impl SlurpProgress {
    /// Files that have reached a terminal state
    pub fn finished(&self) -> u64 {
        self.copied + self.skipped
    }

    /// Calculate bytes per second rate
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Why the drain loop stopped
enum Drained {
    /// Every item reached a terminal state
    Finished,

    /// Shutdown was requested with items still outstanding
    Interrupted { outstanding: usize },

    /// An item hit a major error
    Failed { path: PathBuf, source: ItemError },
}

/// Coordinates one offload run
pub struct SlurpCoordinator {
    config: Arc<SlurpConfig>,
    ops: Arc<dyn FileOps>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
    located: Arc<AtomicU64>,
}

impl SlurpCoordinator {
    /// Create a coordinator using the sequential comparator from `config`
    pub fn new(config: SlurpConfig) -> Self {
        let ops = Arc::new(FileComparator::new(config.buffer_size, config.verify_passes));
        Self::with_file_ops(config, ops)
    }

    /// Create a coordinator with a custom copy/compare capability
    pub fn with_file_ops(config: SlurpConfig, ops: Arc<dyn FileOps>) -> Self {
        Self {
            config: Arc::new(config),
            ops,
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PoolStats::default()),
            located: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Snapshot of the live counters
    pub fn progress(&self, elapsed: Duration) -> SlurpProgress {
        snapshot(&self.stats, &self.located, elapsed)
    }

    /// Run the offload.
    ///
    /// Returns `Err` for any discovery or seeding failure (nothing copied)
    /// and for the first item that hits a major error; the latter carries
    /// the summary counted up to that point. An interrupted run returns
    /// `Ok` with `completed == false`.
    pub fn run(&self) -> Result<SlurpSummary> {
        let start = Instant::now();
        let mut summary = SlurpSummary::new(&self.config.source_roots);

        info!(
            target = %self.config.target_dir.display(),
            roots = self.config.source_roots.len(),
            workers = self.config.worker_count,
            "Starting offload"
        );

        let oracle = Arc::new(TargetNameOracle::new(
            &self.config.target_dir,
            Arc::clone(&self.ops),
        )?);

        let per_root = discover(&self.config.source_roots)?;

        for (root, found) in self.config.source_roots.iter().zip(&per_root) {
            info!(root = %root.display(), files = found.len(), "Located files");
            if let Some(entry) = summary.root_mut(root) {
                entry.located = found.len() as u64;
            }
        }
        let items = merge_by_mtime(per_root);

        let total = items.len();
        summary.files_located = total as u64;
        self.located.store(total as u64, Ordering::Relaxed);

        if total == 0 {
            info!("No files to copy");
            summary.completed = true;
            summary.duration = start.elapsed();
            return Ok(summary);
        }

        let pool = WorkerPool::start(
            self.config.pool_settings(),
            total,
            Arc::clone(&oracle),
            Arc::clone(&self.ops),
            Arc::clone(&self.shutdown),
            Arc::clone(&self.stats),
        )?;

        for item in items {
            if let Err(e) = pool.submit(item) {
                let _ = pool.shutdown();
                return Err(e.into());
            }
        }
        debug!(queued = total, "All work submitted");

        let drained = self.drain(&pool, total, &mut summary);

        // In-flight items that finished after the drain stopped
        match pool.shutdown() {
            Ok(late) => {
                for item in &late {
                    summary.record(item);
                }
            }
            Err(e) => warn!(error = %e, "Worker pool did not shut down cleanly"),
        }
        summary.duration = start.elapsed();

        match drained? {
            Drained::Finished => {
                summary.completed = true;
                info!(
                    copied = summary.files_copied,
                    skipped = summary.files_skipped,
                    retries = summary.retries,
                    names = oracle.claimed_count(),
                    duration_secs = summary.duration.as_secs(),
                    "Offload completed"
                );
                Ok(summary)
            }
            Drained::Interrupted { outstanding } => {
                warn!(outstanding, finished = summary.files_finished(), "Offload interrupted");
                Ok(summary)
            }
            Drained::Failed { path, source } => {
                error!(
                    path = %path.display(),
                    copied = summary.files_copied,
                    skipped = summary.files_skipped,
                    "Major error, run aborted"
                );
                Err(SlurpError::Item {
                    path,
                    source,
                    summary: Box::new(summary),
                })
            }
        }
    }

    /// Run with a callback receiving progress snapshots every 100ms
    pub fn run_with_progress<F>(&self, progress_callback: F) -> Result<SlurpSummary>
    where
        F: Fn(SlurpProgress) + Send + 'static,
    {
        let start = Instant::now();
        let done = Arc::new(AtomicBool::new(false));

        let progress_handle = {
            let done = Arc::clone(&done);
            let shutdown = Arc::clone(&self.shutdown);
            let stats = Arc::clone(&self.stats);
            let located = Arc::clone(&self.located);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) && !shutdown.load(Ordering::Relaxed) {
                    progress_callback(snapshot(&stats, &located, start.elapsed()));
                    thread::sleep(Duration::from_millis(100));
                }
            })
        };

        let result = self.run();

        done.store(true, Ordering::SeqCst);
        let _ = progress_handle.join();

        result
    }

    /// Count results until `total` items are terminal.
    ///
    /// Stops early on shutdown or on the first major error, which also
    /// raises the shutdown flag so workers stop taking new items.
    fn drain(&self, pool: &WorkerPool, total: usize, summary: &mut SlurpSummary) -> Result<Drained> {
        let mut outstanding = total;

        while outstanding > 0 {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown signal received");
                return Ok(Drained::Interrupted { outstanding });
            }

            let item = match pool.recv_result(DRAIN_INTERVAL) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WorkerError::AllWorkersDead.into());
                }
            };
            debug_assert!(item.is_terminal());
            outstanding -= 1;
            summary.record(&item);

            if item.major_error().is_some() {
                // In-flight copies finish on their own
                self.shutdown.store(true, Ordering::SeqCst);
                let path = item.source_path();
                if let Some(source) = item.into_major_error() {
                    return Ok(Drained::Failed { path, source });
                }
            }
        }

        Ok(Drained::Finished)
    }
}

fn snapshot(stats: &PoolStats, located: &AtomicU64, elapsed: Duration) -> SlurpProgress {
    SlurpProgress {
        total: located.load(Ordering::Relaxed),
        copied: stats.copied.load(Ordering::Relaxed),
        skipped: stats.skipped.load(Ordering::Relaxed),
        retries: stats.retries.load(Ordering::Relaxed),
        bytes: stats.bytes_copied.load(Ordering::Relaxed),
        elapsed,
    }
}

/// Merge per-root results into one queue order, oldest first.
///
/// The sort is stable: files with equal timestamps keep root order, then
/// walk order.
pub fn merge_by_mtime(per_root: Vec<Vec<WorkItem>>) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = per_root.into_iter().flatten().collect();
    items.sort_by_key(|item| item.mtime);
    items
}

/// Walk every root on its own thread.
///
/// Results come back in root order. All walkers are joined before any
/// error is returned.
pub fn discover(roots: &[PathBuf]) -> Result<Vec<Vec<WorkItem>>> {
    let mut handles: Vec<(PathBuf, JoinHandle<std::result::Result<Vec<WorkItem>, WalkError>>)> =
        Vec::with_capacity(roots.len());

    for (id, root) in roots.iter().enumerate() {
        let walk_path = root.clone();
        let handle = thread::Builder::new()
            .name(format!("walk-{}", id))
            .spawn(move || walk_root(&walk_path))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            });

        match handle {
            Ok(handle) => handles.push((root.clone(), handle)),
            Err(e) => {
                for (_, handle) in handles {
                    let _ = handle.join();
                }
                return Err(e.into());
            }
        }
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut first_error: Option<SlurpError> = None;

    for (id, (root, handle)) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(items)) => results.push(items),
            Ok(Err(e)) => {
                error!(root = %root.display(), error = %e, "Failed to locate files");
                first_error.get_or_insert(e.into());
            }
            Err(_) => {
                first_error.get_or_insert(
                    WorkerError::Panicked {
                        id,
                        message: format!("walker for '{}' panicked", root.display()),
                    }
                    .into(),
                );
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
