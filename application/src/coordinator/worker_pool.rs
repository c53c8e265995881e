//! Bounded worker pool fed by a FIFO admission queue.

use super::error::CoordinatorError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::debug;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// `size` concurrent slots draining a queue of at most `capacity` jobs.
///
/// A dispatcher pops jobs in arrival order and only pops the next one once a
/// slot is free, so queued work never spawns early.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    tracker: TaskTracker,
    slots: Arc<Semaphore>,
    size: usize,
}

/// A reserved place in the queue. Dropping it gives the place back.
pub struct QueueSlot {
    permit: mpsc::OwnedPermit<Job>,
}

impl QueueSlot {
    pub fn submit<F>(self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.permit.send(Box::pin(job));
    }
}

impl WorkerPool {
    /// Must be called inside a tokio runtime.
    pub fn new(size: usize, capacity: usize) -> Self {
        let size = size.max(1);
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
        let slots = Arc::new(Semaphore::new(size));
        let tracker = TaskTracker::new();

        let dispatcher = {
            let slots = Arc::clone(&slots);
            let tracker = tracker.clone();
            tokio::spawn(async move {
                while let Some(job) = receiver.recv().await {
                    let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                        break;
                    };
                    tracker.spawn(async move {
                        let _permit = permit;
                        job.await;
                    });
                }
                debug!("Worker pool dispatcher stopped");
            })
        };

        Self {
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            tracker,
            slots,
            size,
        }
    }

    /// Reserve a queue place without blocking.
    pub fn reserve(&self) -> Result<QueueSlot, CoordinatorError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CoordinatorError::ShuttingDown)?;
        match sender.try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(mpsc::error::TrySendError::Full(_)) => Err(CoordinatorError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CoordinatorError::ShuttingDown),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs currently holding a slot.
    pub fn active(&self) -> usize {
        self.size - self.slots.available_permits()
    }

    /// Stop accepting work, run everything already queued, then wait for the
    /// last job to finish.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher {
            let _ = dispatcher.await;
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_start_in_fifo_order() {
        let pool = WorkerPool::new(1, 8);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            pool.reserve()
                .unwrap()
                .submit(async move { order.lock().unwrap().push(i) });
        }
        pool.shutdown().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_by_pool_size() {
        let pool = WorkerPool::new(2, 16);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            pool.reserve().unwrap().submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            });
        }
        pool.shutdown().await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_queue_is_refused() {
        let pool = WorkerPool::new(1, 1);
        let _first = pool.reserve().unwrap();
        assert!(matches!(pool.reserve(), Err(CoordinatorError::QueueFull)));
    }

    #[tokio::test]
    async fn test_no_work_after_shutdown() {
        let pool = WorkerPool::new(1, 4);
        pool.shutdown().await;
        assert!(matches!(pool.reserve(), Err(CoordinatorError::ShuttingDown)));
    }
}
