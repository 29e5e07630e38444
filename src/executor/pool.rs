//! Worker-thread executor with per-priority lanes.
//!
//! [`PriorityPool`] runs tasks on a fixed set of OS threads. Each priority
//! class gets its own FIFO lane; workers always drain the most urgent
//! non-empty lane first. With a single lane the pool behaves as a plain
//! FIFO executor and reports one priority, which puts callers on the
//! single-queue fast path.
//!
//! Shutdown is graceful: already-queued tasks are drained, further enqueues
//! are refused with [`EnqueueError::ShutDown`].

use super::{EnqueueError, Executor, Task, NO_PRIORITY};
use crate::tracing_compat::{debug, trace};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on priority lanes; more classes than this stop being
/// priorities and start being a scheduler.
const MAX_PRIORITIES: usize = 8;

/// How long an idle worker sleeps between queue re-checks.
const IDLE_PARK: Duration = Duration::from_millis(50);

/// Configuration for a [`PriorityPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Number of priority lanes (1 = plain FIFO executor).
    pub priorities: usize,
    /// Maximum number of waiting tasks across all lanes (0 = unbounded).
    pub queue_limit: usize,
    /// Name prefix for worker threads.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            priorities: 1,
            queue_limit: 0,
            thread_name_prefix: "rendezvous-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Clamps configuration values to safe ranges.
    pub fn normalize(&mut self) {
        self.workers = self.workers.max(1);
        self.priorities = self.priorities.clamp(1, MAX_PRIORITIES);
    }
}

struct PoolInner {
    /// One FIFO lane per priority class; index 0 is the most urgent.
    lanes: Vec<SegQueue<Task>>,
    /// Number of tasks waiting in the lanes.
    pending: AtomicUsize,
    /// Waiting-task bound, 0 = unbounded.
    queue_limit: usize,
    /// Refuses new work once set.
    shutdown: AtomicBool,
    /// Parking for idle workers.
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl PoolInner {
    fn pop_task(&self) -> Option<Task> {
        for lane in &self.lanes {
            if let Some(task) = lane.pop() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }
        }
        None
    }

    fn worker_loop(&self) {
        loop {
            if let Some(task) = self.pop_task() {
                task();
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            let guard = self.mutex.lock().expect("pool mutex poisoned");
            if self.pending.load(Ordering::Acquire) == 0
                && !self.shutdown.load(Ordering::Acquire)
            {
                let _ = self
                    .condvar
                    .wait_timeout(guard, IDLE_PARK)
                    .expect("pool mutex poisoned");
            }
        }
    }
}

/// A worker-thread executor with per-priority FIFO lanes.
pub struct PriorityPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PriorityPool {
    /// Spawns the worker threads described by `config`.
    #[must_use]
    pub fn new(mut config: PoolConfig) -> Self {
        config.normalize();
        let inner = Arc::new(PoolInner {
            lanes: (0..config.priorities).map(|_| SegQueue::new()).collect(),
            pending: AtomicUsize::new(0),
            queue_limit: config.queue_limit,
            shutdown: AtomicBool::new(false),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        });

        let workers = (0..config.workers)
            .map(|i| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("{}-{i}", config.thread_name_prefix))
                    .spawn(move || inner.worker_loop())
                    .expect("failed to spawn pool worker")
            })
            .collect();

        debug!(
            workers = config.workers,
            priorities = config.priorities,
            "priority pool started"
        );
        Self {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// The number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Stops accepting work, drains queued tasks and joins the workers.
    /// Idempotent; a worker thread calling this skips joining itself.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::AcqRel) {
            debug!("priority pool shutting down");
        }
        {
            let _guard = self.inner.mutex.lock().expect("pool mutex poisoned");
            self.inner.condvar.notify_all();
        }
        let handles = std::mem::take(&mut *self.workers.lock().expect("pool workers poisoned"));
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    fn lane_for(&self, priority: i8) -> usize {
        let lanes = self.inner.lanes.len();
        if priority == NO_PRIORITY {
            lanes / 2
        } else {
            usize::try_from(priority.max(0)).unwrap_or(0).min(lanes - 1)
        }
    }

    fn push(&self, task: Task, lane: usize) -> Result<(), EnqueueError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(EnqueueError::ShutDown);
        }
        if self.inner.queue_limit > 0
            && self.inner.pending.load(Ordering::Acquire) >= self.inner.queue_limit
        {
            return Err(EnqueueError::QueueFull);
        }
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        self.inner.lanes[lane].push(task);
        trace!(lane, "task enqueued");
        let _guard = self.inner.mutex.lock().expect("pool mutex poisoned");
        self.inner.condvar.notify_one();
        Ok(())
    }
}

impl Executor for PriorityPool {
    fn num_priorities(&self) -> usize {
        self.inner.lanes.len()
    }

    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        let lane = self.lane_for(NO_PRIORITY);
        self.push(task, lane)
    }

    fn enqueue_with_priority(&self, task: Task, priority: i8) -> Result<(), EnqueueError> {
        let lane = self.lane_for(priority);
        self.push(task, lane)
    }
}

impl Drop for PriorityPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PriorityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityPool")
            .field("priorities", &self.inner.lanes.len())
            .field("pending", &self.pending())
            .field(
                "shutdown",
                &self.inner.shutdown.load(Ordering::Relaxed),
            )
            .finish()
    }
}
