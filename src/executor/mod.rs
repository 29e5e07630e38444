//! The executor boundary consumed by the core's dispatch path.
//!
//! The core does not schedule work itself; when a consumer attaches an
//! executor, the Armed→Done transition submits the callback invocation as a
//! [`Task`]. The contract is deliberately small:
//!
//! - [`Executor::num_priorities`] reports how many priority classes the
//!   executor distinguishes; the core uses the plain [`Executor::enqueue`]
//!   path iff this returns 1.
//! - Both enqueue operations may fail, and failures are typed so the core
//!   can convert them into a failure outcome and fall back to invoking the
//!   callback on the current thread.
//!
//! Two in-tree executors cover the common cases: [`ManualExecutor`] for
//! deterministic tests and [`PriorityPool`] for real worker threads.

mod manual;
mod pool;

pub use manual::ManualExecutor;
pub use pool::{PoolConfig, PriorityPool};

use crate::error::{Error, ErrorKind};
use thiserror::Error as ThisError;

/// A unit of work submitted to an executor, run exactly once.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The priority sentinel meaning "no preference".
///
/// Executors with more than one priority class map it to their default
/// lane.
pub const NO_PRIORITY: i8 = -1;

/// Errors reported by an executor's enqueue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum EnqueueError {
    /// The executor's queue is at capacity.
    #[error("executor queue is full")]
    QueueFull,

    /// The executor has been shut down and accepts no further work.
    #[error("executor is shut down")]
    ShutDown,
}

impl From<EnqueueError> for Error {
    fn from(err: EnqueueError) -> Self {
        Self::new(ErrorKind::DispatchFailed).with_source(err)
    }
}

/// An opaque work queue that runs submitted tasks once.
///
/// On an enqueue error the task must be dropped without ever running;
/// callers rely on that to deliver a fallback on the submitting thread
/// exactly once.
pub trait Executor: Send + Sync {
    /// The number of priority classes this executor distinguishes (≥ 1).
    fn num_priorities(&self) -> usize {
        1
    }

    /// Accepts a task to run once, with no priority preference.
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError>;

    /// Accepts a task to run once, with a priority hint. `priority` is
    /// [`NO_PRIORITY`] or an index in `0..num_priorities()`, lower being
    /// more urgent; out-of-range hints are clamped.
    fn enqueue_with_priority(&self, task: Task, priority: i8) -> Result<(), EnqueueError> {
        let _ = priority;
        self.enqueue(task)
    }
}
