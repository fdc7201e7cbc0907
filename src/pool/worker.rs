//! Worker thread logic for the copy pool
//!
//! Each worker:
//! - Pulls work items from the shared queue
//! - Asks the naming oracle for a target path
//! - Copies, then verifies with the comparator
//! - Resubmits the item on a verification mismatch until the retry
//!   ceiling is reached
//! - Emits every terminal item on the result stream

use crate::content::{apply_mode, FileOps, WriteMode};
use crate::error::{ItemError, WorkerError};
use crate::naming::TargetNameOracle;
use crate::pool::queue::{WorkQueueReceiver, WorkQueueSender};
use crate::types::WorkItem;
use crossbeam_channel::Sender;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long a worker waits on an empty queue before rechecking shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Claims tried for one attempt when freshly claimed names keep turning
/// out to exist on disk
const MAX_CLAIM_ROUNDS: u32 = 8;

/// Counters shared by every worker in a pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Items copied and verified
    pub copied: AtomicU64,

    /// Items skipped as already present
    pub skipped: AtomicU64,

    /// Items that hit a major error
    pub failed: AtomicU64,

    /// Verification mismatches that led to a resubmission
    pub retries: AtomicU64,

    /// Bytes written by verified copies
    pub bytes_copied: AtomicU64,
}

impl PoolStats {
    fn record_copy(&self, bytes: u64) {
        self.copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Items that have reached a terminal state
    pub fn finished(&self) -> u64 {
        self.copied.load(Ordering::Relaxed)
            + self.skipped.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
    }
}

/// Everything a worker needs besides its queue handles
#[derive(Clone)]
pub struct WorkerContext {
    pub oracle: Arc<TargetNameOracle>,
    pub ops: Arc<dyn FileOps>,
    pub max_retries: u32,
    pub shutdown: Arc<AtomicBool>,
    pub stats: Arc<PoolStats>,
}

/// What happens to an item after one attempt
#[derive(Debug)]
pub enum Disposition {
    /// Terminal: skipped, copied or failed
    Done(WorkItem),

    /// Verification mismatch with retries left
    Retry(WorkItem),
}

/// A worker thread that processes work items
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<Result<(), WorkerError>>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: WorkerContext,
        queue_rx: WorkQueueReceiver,
        queue_tx: WorkQueueSender,
        results: Sender<WorkItem>,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("slurp-worker-{}", id))
            .spawn(move || worker_loop(id, ctx, queue_rx, queue_tx, results))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: "Worker thread panicked".into(),
                }),
            }
        } else {
            Ok(())
        }
    }
}

/// Main worker loop
///
/// Shutdown is only observed between items, so a copy in progress always
/// runs to completion.
fn worker_loop(
    id: usize,
    ctx: WorkerContext,
    queue_rx: WorkQueueReceiver,
    queue_tx: WorkQueueSender,
    results: Sender<WorkItem>,
) -> Result<(), WorkerError> {
    debug!(worker = id, "Worker starting");

    while !ctx.shutdown.load(Ordering::Relaxed) {
        let item = match queue_rx.recv_timeout(POLL_INTERVAL) {
            Some(item) => item,
            None => continue,
        };

        let finished = match process_item(id, item, &ctx) {
            Disposition::Done(item) => item,
            Disposition::Retry(item) => match queue_tx.requeue(item) {
                Ok(()) => continue,
                Err(mut item) => {
                    item.fail(ItemError::Requeue(WorkerError::QueueSendFailed));
                    item
                }
            },
        };

        if finished.major_error().is_some() {
            ctx.stats.record_failure();
        }
        if results.send(finished).is_err() {
            warn!(worker = id, "Result channel closed, worker exiting");
            return Err(WorkerError::ResultChannelClosed);
        }
    }

    debug!(worker = id, "Worker finished");
    Ok(())
}

/// Run one attempt for `item`: name, copy, verify.
pub fn process_item(id: usize, mut item: WorkItem, ctx: &WorkerContext) -> Disposition {
    let source = item.source_path();

    let (target, bytes) = match claim_and_copy(id, &mut item, &source, ctx) {
        Some(written) => written,
        None => return Disposition::Done(item),
    };

    match ctx.ops.content_equal(&source, &target) {
        Ok(true) => {
            if let Err(e) = apply_mode(&target, item.mode) {
                error!(worker = id, target = %target.display(), error = %e, "Failed to set permissions");
                item.fail(ItemError::Permissions { target, source: e });
                return Disposition::Done(item);
            }
            debug!(worker = id, source = %source.display(), bytes, "Copied");
            ctx.stats.record_copy(bytes);
            item.mark_copied(target);
            Disposition::Done(item)
        }
        Ok(false) => {
            warn!(worker = id, source = %source.display(), "File verification did not match");
            if item.record_verify_failure(target, ctx.max_retries) {
                ctx.stats.record_retry();
                info!(
                    worker = id,
                    source = %source.display(),
                    retry = item.retries_used(),
                    "Requeuing"
                );
                Disposition::Retry(item)
            } else {
                error!(worker = id, source = %source.display(), "Out of retries");
                Disposition::Done(item)
            }
        }
        Err(e) => {
            error!(worker = id, source = %source.display(), error = %e, "Verification failed");
            item.fail(ItemError::Verify { target, source: e });
            Disposition::Done(item)
        }
    }
}

/// Claim a target and copy into it.
///
/// Returns the written target and byte count, or `None` once `item` is
/// terminal (skipped or failed). A fresh claim is written with
/// `CreateNew`; if something appeared there after seeding, the name goes
/// back through the oracle, which compares against the newcomer.
fn claim_and_copy(
    id: usize,
    item: &mut WorkItem,
    source: &Path,
    ctx: &WorkerContext,
) -> Option<(PathBuf, u64)> {
    let mut previous = item.target().map(Path::to_path_buf);
    let mut taken = PathBuf::new();

    for _ in 0..MAX_CLAIM_ROUNDS {
        let claim = match ctx.oracle.claim(source, previous.as_deref()) {
            Ok(claim) => claim,
            Err(e) => {
                // Naming failures are structural, never retried
                error!(worker = id, source = %source.display(), error = %e, "Failed to get target name");
                item.fail(ItemError::Naming(e));
                return None;
            }
        };

        if claim.already_present {
            info!(worker = id, target = %claim.target.display(), "Skipping (already copied)");
            ctx.stats.record_skip();
            item.mark_skipped(claim.target);
            return None;
        }

        debug!(worker = id, source = %source.display(), target = %claim.target.display(), "Using target name");

        let mode = if claim.reissued {
            WriteMode::Replace
        } else {
            WriteMode::CreateNew
        };

        match ctx.ops.copy(source, &claim.target, mode) {
            Ok(bytes) => return Some((claim.target, bytes)),
            Err(e) if mode == WriteMode::CreateNew && e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    worker = id,
                    target = %claim.target.display(),
                    "Target appeared after seeding, claiming again"
                );
                previous = None;
                taken = claim.target;
            }
            Err(e) => {
                error!(worker = id, source = %source.display(), error = %e, "Copy failed");
                item.fail(ItemError::Copy {
                    target: claim.target,
                    source: e,
                });
                return None;
            }
        }
    }

    error!(worker = id, source = %source.display(), "No free target name");
    item.fail(ItemError::Copy {
        target: taken,
        source: io::Error::new(ErrorKind::AlreadyExists, "every claimed name was already taken"),
    });
    None
}
