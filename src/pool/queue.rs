//! Work queue and result stream for the worker pool
//!
//! The work queue is bounded to the number of items the run will submit.
//! Every item is either queued, held by one worker, or already emitted as
//! a result, so a retry resubmission can never find the queue full.

use crate::types::WorkItem;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::trace;

/// Work queue shared by all workers
pub struct WorkQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
}

impl WorkQueue {
    /// Create a new work queue with room for `capacity` items
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    /// Get a sender for this queue (clone for each worker)
    pub fn sender(&self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender.clone(),
        }
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

/// Handle for sending items to the queue
#[derive(Clone)]
pub struct WorkQueueSender {
    sender: Sender<WorkItem>,
}

impl WorkQueueSender {
    /// Send an item, blocking if necessary.
    ///
    /// Returns the item back if every receiver is gone.
    pub fn send(&self, item: WorkItem) -> Result<(), WorkItem> {
        self.sender.send(item).map_err(|e| e.into_inner())
    }

    /// Resubmit an item for another attempt, behind whatever is waiting
    pub fn requeue(&self, item: WorkItem) -> Result<(), WorkItem> {
        trace!(
            source = %item.source_path().display(),
            waiting = self.sender.len(),
            "Requeue"
        );
        self.send(item)
    }
}

/// Handle for receiving items from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<WorkItem>,
}

impl WorkQueueReceiver {
    /// Receive with timeout; `None` on timeout or disconnect
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Try to receive an item without blocking
    pub fn try_recv(&self) -> Option<WorkItem> {
        self.receiver.try_recv().ok()
    }
}

/// Terminal items emitted by workers
pub struct ResultStream {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
}

impl ResultStream {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Sender for a worker
    pub fn sender(&self) -> Sender<WorkItem> {
        self.sender.clone()
    }

    /// Split into the receiving end, dropping the stream's own sender so
    /// the receiver disconnects once every worker has exited.
    pub fn into_receiver(self) -> ResultReceiver {
        ResultReceiver {
            receiver: self.receiver,
        }
    }
}

impl Default for ResultStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of the result stream
pub struct ResultReceiver {
    receiver: Receiver<WorkItem>,
}

impl ResultReceiver {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<WorkItem, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything already emitted, without waiting
    pub fn drain_ready(&self) -> Vec<WorkItem> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn item(name: &str) -> WorkItem {
        WorkItem::new("/r", "/r", name, 0o644, 1, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_queue_basic() {
        let queue = WorkQueue::new(10);
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.send(item("a.jpg")).unwrap();

        let got = receiver.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(got.file_name, "a.jpg");
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_queue_fifo_order() {
        let queue = WorkQueue::new(3);
        let sender = queue.sender();
        let receiver = queue.receiver();

        for name in ["1", "2", "3"] {
            sender.send(item(name)).unwrap();
        }
        let order: Vec<_> = std::iter::from_fn(|| receiver.try_recv())
            .map(|i| i.file_name.into_string().unwrap())
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_requeue_goes_to_the_back() {
        let queue = WorkQueue::new(2);
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.send(item("first")).unwrap();
        sender.send(item("second")).unwrap();
        let first = receiver.try_recv().unwrap();
        sender.requeue(first).unwrap();

        assert_eq!(receiver.try_recv().unwrap().file_name, "second");
        assert_eq!(receiver.try_recv().unwrap().file_name, "first");
    }

    #[test]
    fn test_recv_timeout_empty() {
        let queue = WorkQueue::new(1);
        assert!(queue.receiver().recv_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_result_stream_disconnects() {
        let stream = ResultStream::new();
        let tx = stream.sender();
        let rx = stream.into_receiver();

        tx.send(item("done")).unwrap();
        drop(tx);

        assert!(rx.recv_timeout(Duration::from_millis(10)).is_ok());
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_drain_ready() {
        let stream = ResultStream::new();
        let tx = stream.sender();
        let rx = stream.into_receiver();

        tx.send(item("a")).unwrap();
        tx.send(item("b")).unwrap();

        assert_eq!(rx.drain_ready().len(), 2);
        assert!(rx.drain_ready().is_empty());
    }
}
