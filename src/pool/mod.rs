//! Copy worker pool
//!
//! A fixed number of workers drain one shared queue. Terminal items come
//! back on a separate result stream; verification mismatches go back onto
//! the queue, behind whatever was already waiting.
//!
//! ```text
//!   submit ──► ┌──────────────┐ ◄── requeue (verify mismatch)
//!              │  Work Queue  │            ▲
//!              └──────┬───────┘            │
//!          ┌──────────┼──────────┐         │
//!    ┌─────▼────┐ ┌───▼──────┐ ┌─▼────────┐│
//!    │ Worker 0 │ │ Worker 1 │ │ Worker N ├┘
//!    │ claim    │ │ claim    │ │ claim    │
//!    │ copy     │ │ copy     │ │ copy     │
//!    │ verify   │ │ verify   │ │ verify   │
//!    └─────┬────┘ └───┬──────┘ └─┬────────┘
//!          └──────────┼──────────┘
//!                     ▼
//!              Result Stream ──► coordinator
//! ```

pub mod queue;
pub mod worker;

pub use queue::WorkQueue;
pub use worker::{process_item, Disposition, PoolStats, Worker, WorkerContext};

use crate::content::FileOps;
use crate::error::WorkerError;
use crate::naming::TargetNameOracle;
use crate::types::WorkItem;
use crossbeam_channel::RecvTimeoutError;
use queue::{ResultReceiver, ResultStream, WorkQueueSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sizing and retry policy for a pool
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// Number of worker threads
    pub workers: usize,

    /// Resubmissions allowed per item after a verification mismatch
    pub max_retries: u32,
}

/// Running pool of copy workers
pub struct WorkerPool {
    // Held so submissions succeed even after every worker has exited
    _queue: WorkQueue,
    sender: WorkQueueSender,
    results: ResultReceiver,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn the workers.
    ///
    /// `capacity` must be at least the number of items that will be
    /// submitted.
    pub fn start(
        settings: PoolSettings,
        capacity: usize,
        oracle: Arc<TargetNameOracle>,
        ops: Arc<dyn FileOps>,
        shutdown: Arc<AtomicBool>,
        stats: Arc<PoolStats>,
    ) -> Result<Self, WorkerError> {
        let queue = WorkQueue::new(capacity);
        let stream = ResultStream::new();

        let ctx = WorkerContext {
            oracle,
            ops,
            max_retries: settings.max_retries,
            shutdown: Arc::clone(&shutdown),
            stats,
        };

        let mut workers = Vec::with_capacity(settings.workers);
        for id in 0..settings.workers {
            let worker = Worker::spawn(
                id,
                ctx.clone(),
                queue.receiver(),
                queue.sender(),
                stream.sender(),
            );
            match worker {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    shutdown.store(true, Ordering::SeqCst);
                    join_all(workers);
                    return Err(e);
                }
            }
        }

        info!(count = workers.len(), "Workers spawned");

        Ok(Self {
            sender: queue.sender(),
            _queue: queue,
            results: stream.into_receiver(),
            workers,
            shutdown,
        })
    }

    /// Put an item on the work queue
    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        self.sender
            .send(item)
            .map_err(|_| WorkerError::QueueSendFailed)
    }

    /// Wait for the next terminal item
    pub fn recv_result(&self, timeout: Duration) -> Result<WorkItem, RecvTimeoutError> {
        self.results.recv_timeout(timeout)
    }

    /// Signal shutdown and wait for every worker to finish its current item.
    ///
    /// Returns the results emitted but not yet received, so items that
    /// finished during shutdown are still counted.
    pub fn shutdown(self) -> Result<Vec<WorkItem>, WorkerError> {
        self.shutdown.store(true, Ordering::SeqCst);
        let joined = join_all(self.workers);
        let late = self.results.drain_ready();
        match joined {
            Some(e) => Err(e),
            None => Ok(late),
        }
    }
}

/// Join workers, returning the first failure
fn join_all(workers: Vec<Worker>) -> Option<WorkerError> {
    let mut first = None;
    for worker in workers {
        let id = worker.id();
        if let Err(e) = worker.join() {
            warn!(worker = id, error = %e, "Worker failed to join cleanly");
            first.get_or_insert(e);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FileComparator;
    use std::collections::HashSet;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::tempdir;

    #[test]
    fn test_pool_copies_everything_once() {
        let src = tempdir().unwrap();
        let target = tempdir().unwrap();
        for i in 0..20 {
            fs::write(src.path().join(format!("img{:03}.jpg", i)), format!("data-{}", i)).unwrap();
        }

        let ops: Arc<dyn FileOps> = Arc::new(FileComparator::default());
        let oracle = Arc::new(TargetNameOracle::new(target.path(), Arc::clone(&ops)).unwrap());
        let stats = Arc::new(PoolStats::default());
        let pool = WorkerPool::start(
            PoolSettings {
                workers: 4,
                max_retries: 1,
            },
            20,
            oracle,
            ops,
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&stats),
        )
        .unwrap();

        for i in 0..20 {
            let name = format!("img{:03}.jpg", i);
            pool.submit(WorkItem::new(src.path(), src.path(), name, 0o644, 6, SystemTime::now()))
                .unwrap();
        }

        let mut targets = HashSet::new();
        for _ in 0..20 {
            let item = pool.recv_result(Duration::from_secs(10)).unwrap();
            assert!(item.is_copied());
            assert!(targets.insert(item.target().unwrap().to_path_buf()));
        }

        assert!(pool.shutdown().unwrap().is_empty());
        assert_eq!(stats.finished(), 20);
        assert_eq!(fs::read_dir(target.path()).unwrap().count(), 20);
    }

    #[test]
    fn test_shutdown_idle_pool() {
        let target = tempdir().unwrap();
        let ops: Arc<dyn FileOps> = Arc::new(FileComparator::default());
        let oracle = Arc::new(TargetNameOracle::new(target.path(), Arc::clone(&ops)).unwrap());

        let pool = WorkerPool::start(
            PoolSettings {
                workers: 2,
                max_retries: 0,
            },
            1,
            oracle,
            ops,
            Arc::new(AtomicBool::new(false)),
            Arc::new(PoolStats::default()),
        )
        .unwrap();

        assert!(pool.shutdown().unwrap().is_empty());
    }
}
