//! Thin endpoint handles over a shared [`Core`].
//!
//! [`pair`] creates a core and hands one share to each endpoint. The
//! handles exist to carry the teardown contract (dropping a [`Promise`]
//! without a result delivers a broken-promise failure, dropping a
//! [`Future`] re-enables a suppressed delivery) and to give the fan-in
//! contexts an embedded promise. There is no `.then` chaining and no
//! waiting; registering a callback is the only way to consume a future.
//!
//! Handles are `Send` but not `Clone`: each endpoint is owned by one thread
//! at a time and moves between threads by handoff.

use crate::core::Core;
use crate::error::Result;
use crate::executor::Executor;
use crate::types::{ErrorValue, Outcome};
use std::sync::Arc;

/// Creates a connected promise/future pair.
#[must_use]
pub fn pair<T: Send + 'static>() -> (Promise<T>, Future<T>) {
    let core = Core::new();
    (
        Promise { core: core.clone() },
        Future { core },
    )
}

/// The producer endpoint: delivers the outcome exactly once.
#[derive(Debug)]
pub struct Promise<T: Send + 'static> {
    core: Core<T>,
}

impl<T: Send + 'static> Promise<T> {
    /// Delivers an outcome. Fails with `ResultAlreadySet` on a second call.
    pub fn set_outcome(&self, outcome: Outcome<T>) -> Result<()> {
        self.core.set_result(outcome)
    }

    /// Delivers a success value.
    pub fn set_value(&self, value: T) -> Result<()> {
        self.set_outcome(Outcome::Value(value))
    }

    /// Delivers a failure.
    pub fn set_error(&self, err: ErrorValue) -> Result<()> {
        self.set_outcome(Outcome::Failure(err))
    }

    /// Returns true once an outcome has been delivered.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.core.has_result()
    }

    /// Installs the handler that runs when the consumer raises an
    /// interrupt. A no-op after the outcome has been delivered; if an
    /// interrupt is already pending the handler runs immediately.
    pub fn set_interrupt_handler<F>(&self, handler: F)
    where
        F: FnOnce(ErrorValue) + Send + 'static,
    {
        self.core.set_interrupt_handler(handler);
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        self.core.detach_promise();
    }
}

/// The consumer endpoint: registers the continuation and controls
/// delivery.
#[derive(Debug)]
pub struct Future<T: Send + 'static> {
    core: Core<T>,
}

impl<T: Send + 'static> Future<T> {
    /// Creates a future already carrying `outcome`, with no producer.
    #[must_use]
    pub fn ready(outcome: Outcome<T>) -> Self {
        Self {
            core: Core::with_result(outcome),
        }
    }

    /// Registers the continuation that receives the outcome. Fails with
    /// `CallbackAlreadySet` on a second call.
    pub fn set_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.core.set_callback(callback)
    }

    /// Returns true once the producer has delivered an outcome.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.core.has_result()
    }

    /// Returns the delivery-permission flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Permits delivery and fires a suppressed callback promptly.
    pub fn activate(&self) {
        self.core.activate();
    }

    /// Suppresses delivery until a later [`activate`](Self::activate) (or
    /// until this handle is dropped).
    pub fn deactivate(&self) {
        self.core.deactivate();
    }

    /// Routes the callback through `executor` with a priority hint;
    /// [`NO_PRIORITY`](crate::executor::NO_PRIORITY) means no preference.
    pub fn set_executor(&self, executor: Arc<dyn Executor>, priority: i8) {
        self.core.set_executor(Some(executor), priority);
    }

    /// Asks the producer to cancel. Recorded at most once, and only while
    /// no outcome has been delivered.
    pub fn raise(&self, err: ErrorValue) {
        self.core.raise(err);
    }

    /// A shared view of the underlying core, for callers that outlive the
    /// handle (any-thread observation, late activation).
    #[must_use]
    pub fn core(&self) -> Core<T> {
        self.core.clone()
    }
}

impl<T: Send + 'static> Drop for Future<T> {
    fn drop(&mut self) {
        self.core.detach_future();
    }
}
