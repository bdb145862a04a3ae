use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use glimmer_lighting::WorkQueue;

/// Lock-free pool for reusing propagation work queues across tasks.
pub struct QueuePool {
    available_tx: Sender<WorkQueue>,
    available_rx: Receiver<WorkQueue>,
    allocated: AtomicUsize,
    max_queues: usize,
    queue_capacity: usize,
}

impl QueuePool {
    pub fn new(max_queues: usize, queue_capacity: usize) -> Self {
        let max_queues = max_queues.max(1);
        let (tx, rx) = bounded(max_queues);
        Self {
            available_tx: tx,
            available_rx: rx,
            allocated: AtomicUsize::new(0),
            max_queues,
            queue_capacity,
        }
    }

    pub fn with_capacity_from_workers(worker_count: usize, queue_capacity: usize) -> Self {
        Self::new(worker_count.max(1) * 2, queue_capacity)
    }

    /// Takes an idle queue, allocating one while under the limit, otherwise waits for a release.
    pub fn acquire(&self) -> PooledQueue<'_> {
        if let Ok(queue) = self.available_rx.try_recv() {
            return PooledQueue { queue, pool: self };
        }
        loop {
            let prev = self.allocated.fetch_add(1, Ordering::AcqRel);
            if prev < self.max_queues {
                return PooledQueue {
                    queue: WorkQueue::new(self.queue_capacity),
                    pool: self,
                };
            }
            self.allocated.fetch_sub(1, Ordering::AcqRel);
            if let Ok(queue) = self.available_rx.recv() {
                return PooledQueue { queue, pool: self };
            }
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    fn release(&self, mut queue: WorkQueue) {
        queue.clear();
        let _ = self.available_tx.try_send(queue);
    }
}

pub struct PooledQueue<'pool> {
    queue: WorkQueue,
    pool: &'pool QueuePool,
}

impl Deref for PooledQueue<'_> {
    type Target = WorkQueue;

    fn deref(&self) -> &Self::Target {
        &self.queue
    }
}

impl DerefMut for PooledQueue<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.queue
    }
}

impl Drop for PooledQueue<'_> {
    fn drop(&mut self) {
        let queue = std::mem::replace(&mut self.queue, WorkQueue::new(0));
        self.pool.release(queue);
    }
}
