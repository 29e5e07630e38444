//! Deterministic executor drained by hand.
//!
//! [`ManualExecutor`] queues tasks and runs nothing until the test calls
//! [`run_one`](ManualExecutor::run_one) or
//! [`run_all`](ManualExecutor::run_all) on a thread of its choosing. This
//! makes the in-flight window of the dispatch path observable: a test can
//! assert what holds between enqueue and invocation.

use super::{EnqueueError, Executor, Task};
use crossbeam_queue::SegQueue;

/// A single-queue executor whose tasks run only when explicitly drained.
#[derive(Default)]
pub struct ManualExecutor {
    queue: SegQueue<Task>,
}

impl ManualExecutor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs the oldest queued task on the calling thread. Returns whether a
    /// task was run.
    pub fn run_one(&self) -> bool {
        match self.queue.pop() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs queued tasks until the queue is empty, including tasks enqueued
    /// by the tasks themselves. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Executor for ManualExecutor {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        self.queue.push(task);
        Ok(())
    }
}

impl std::fmt::Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}
