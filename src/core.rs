//! The shared core of a promise/future pair.
//!
//! A [`Core`] is the rendezvous object jointly referenced by a producer and
//! a consumer. Its life is a walk along a five-state graph:
//!
//! ```text
//!              OnlyCallback
//!            /              \
//!   Start                     Armed ── Done
//!            \              /
//!              OnlyResult
//! ```
//!
//! The producer stores the result, the consumer stores the callback; either
//! order is legal, and whichever side arrives second arms the core. The
//! callback fires exactly once, on the Armed→Done transition, and only
//! while the core is active. Transitions never move backward and `Done` is
//! terminal.
//!
//! # Ownership
//!
//! Every constructor heap-allocates the shared state; a `Core` value is one
//! share of it. The promise and future handles each hold a share, and each
//! executor task queued by the dispatch path clones a third, transient
//! share for as long as it is in flight. The state is destroyed when the
//! last share drops.
//!
//! # Thread affinity
//!
//! Some operations must only be called from the thread that currently owns
//! the corresponding endpoint handle (enforced by convention, as the
//! handles are moved across threads by handoff):
//!
//! - producer side: [`set_result`](Core::set_result),
//!   [`set_interrupt_handler`](Core::set_interrupt_handler),
//!   [`detach_promise`](Core::detach_promise)
//! - consumer side: [`set_callback`](Core::set_callback),
//!   [`raise`](Core::raise), [`set_executor`](Core::set_executor),
//!   [`detach_future`](Core::detach_future)
//! - any thread: [`has_result`](Core::has_result),
//!   [`activate`](Core::activate), [`deactivate`](Core::deactivate),
//!   [`is_active`](Core::is_active), [`executor`](Core::executor)

use crate::context::{self, Token};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::{Executor, Task};
use crate::fsm::{Fsm, StateBits};
use crate::interrupt::InterruptCell;
use crate::tracing_compat::{trace, warn};
use crate::types::{ErrorValue, Outcome};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The five states of a core. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    OnlyResult,
    OnlyCallback,
    Armed,
    Done,
}

impl StateBits for State {
    fn into_bits(self) -> u8 {
        match self {
            Self::Start => 0,
            Self::OnlyResult => 1,
            Self::OnlyCallback => 2,
            Self::Armed => 3,
            Self::Done => 4,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Start,
            1 => Self::OnlyResult,
            2 => Self::OnlyCallback,
            3 => Self::Armed,
            4 => Self::Done,
            _ => unreachable!("invalid core state bits"),
        }
    }
}

/// The erased consumer continuation.
///
/// A boxed zero-capture closure does not allocate, so small continuations
/// stay allocation-free; capturing ones take one heap allocation.
type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

/// Data published by state transitions, reachable only through the cell.
struct CoreData<T> {
    /// Set exactly once; taken together with the callback at delivery.
    result: Option<Outcome<T>>,
    /// Set at most once; consumed exactly once on entry to `Done`.
    callback: Option<Callback<T>>,
    /// Request context captured when the callback was registered.
    context: Option<Token>,
}

/// Executor handle plus priority, read on every dispatch.
struct ExecutorSlot {
    executor: Option<Arc<dyn Executor>>,
    priority: i8,
}

struct CoreInner<T> {
    fsm: Fsm<State, CoreData<T>>,
    /// Gates the Armed→Done transition. True by default.
    active: AtomicBool,
    executor: Mutex<ExecutorSlot>,
    interrupt: InterruptCell,
}

/// One share of the shared state of a promise/future pair.
///
/// Cloning a `Core` clones the share, not the state; see the module docs
/// for the ownership story.
pub struct Core<T> {
    inner: Arc<CoreInner<T>>,
}

impl<T> Clone for Core<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Core<T> {
    /// Creates an empty core in `Start`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CoreInner {
                fsm: Fsm::new(
                    State::Start,
                    CoreData {
                        result: None,
                        callback: None,
                        context: None,
                    },
                ),
                active: AtomicBool::new(true),
                executor: Mutex::new(ExecutorSlot {
                    executor: None,
                    priority: crate::executor::NO_PRIORITY,
                }),
                interrupt: InterruptCell::default(),
            }),
        }
    }

    /// Creates an already-fulfilled core in `OnlyResult`.
    ///
    /// Used for futures that carry an immediate outcome and never had a
    /// producer; such a core has a single owning handle.
    #[must_use]
    pub fn with_result(outcome: Outcome<T>) -> Self {
        let core = Self::new();
        let stored = core
            .inner
            .fsm
            .transition(State::Start, State::OnlyResult, |data| {
                data.result = Some(outcome);
            });
        debug_assert!(stored, "fresh core starts in Start");
        core
    }

    /// Returns true once a result has been stored. Monotone: once observed
    /// true on any thread, it never returns false again.
    #[must_use]
    pub fn has_result(&self) -> bool {
        matches!(
            self.inner.fsm.state(),
            State::OnlyResult | State::Armed | State::Done
        )
    }

    /// Alias for [`has_result`](Self::has_result).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.has_result()
    }

    /// Locked view of the stored outcome.
    ///
    /// Fails with `NotReady` before a result is stored and with
    /// `ResultConsumed` once the callback has taken it. The guard blocks
    /// state transitions; keep it short-lived.
    pub fn result(&self) -> Result<MappedMutexGuard<'_, Outcome<T>>> {
        if !self.has_result() {
            return Err(Error::new(ErrorKind::NotReady));
        }
        let data = self.inner.fsm.lock_data();
        MutexGuard::try_map(data, |d| d.result.as_mut())
            .map_err(|_| Error::new(ErrorKind::ResultConsumed))
    }

    /// Stores the computation's outcome. Producer side.
    ///
    /// Legal only in `Start` (→ `OnlyResult`) and `OnlyCallback`
    /// (→ `Armed`, then delivery is attempted). A second call fails with
    /// `ResultAlreadySet`.
    pub fn set_result(&self, outcome: Outcome<T>) -> Result<()> {
        let armed = self.inner.fsm.update(|state, data| match state {
            State::Start => {
                data.result = Some(outcome);
                (Some(State::OnlyResult), Ok(false))
            }
            State::OnlyCallback => {
                data.result = Some(outcome);
                (Some(State::Armed), Ok(true))
            }
            State::OnlyResult | State::Armed | State::Done => {
                (None, Err(Error::new(ErrorKind::ResultAlreadySet)))
            }
        })?;
        trace!(armed, "result stored");
        if armed {
            self.maybe_fire();
        }
        Ok(())
    }

    /// Registers the consumer continuation. Consumer side.
    ///
    /// Captures the calling thread's request context; the context is
    /// reinstalled around the callback invocation wherever it runs. Legal
    /// only in `Start` (→ `OnlyCallback`) and `OnlyResult` (→ `Armed`,
    /// then delivery is attempted). A second call fails with
    /// `CallbackAlreadySet`.
    pub fn set_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let token = context::capture();
        let callback: Callback<T> = Box::new(callback);
        let armed = self.inner.fsm.update(|state, data| match state {
            State::Start => {
                data.callback = Some(callback);
                data.context = Some(token);
                (Some(State::OnlyCallback), Ok(false))
            }
            State::OnlyResult => {
                data.callback = Some(callback);
                data.context = Some(token);
                (Some(State::Armed), Ok(true))
            }
            State::OnlyCallback | State::Armed | State::Done => {
                (None, Err(Error::new(ErrorKind::CallbackAlreadySet)))
            }
        })?;
        trace!(armed, "callback registered");
        if armed {
            self.maybe_fire();
        }
        Ok(())
    }

    /// Attempts the Armed→Done transition and delivery.
    ///
    /// Acts only in `Armed` with the active flag set; any other state is a
    /// no-op, so the call is idempotent and safe from either side, from
    /// [`activate`](Self::activate), and from any number of races between
    /// them.
    pub(crate) fn maybe_fire(&self) {
        if !self.is_active() {
            return;
        }
        // The dispatch runs in the after-publish slot, outside the state
        // cell's critical section.
        let _ = self
            .inner
            .fsm
            .transition_then(State::Armed, State::Done, |_| (), |()| self.dispatch());
    }

    /// Delivers the outcome to the callback, honoring the executor slot.
    fn dispatch(&self) {
        let (executor, priority) = {
            let slot = self.inner.executor.lock();
            (slot.executor.clone(), slot.priority)
        };
        let Some(executor) = executor else {
            self.invoke_now();
            return;
        };

        // The queued task owns a transient share of the core so the state
        // outlives both handles while the work is in flight.
        let task_core = self.clone();
        let task: Task = Box::new(move || task_core.invoke_now());
        let submitted = if executor.num_priorities() == 1 {
            executor.enqueue(task)
        } else {
            executor.enqueue_with_priority(task, priority)
        };
        if let Err(err) = submitted {
            warn!(%err, "executor refused dispatch, invoking callback inline");
            {
                let mut data = self.inner.fsm.lock_data();
                data.result = Some(Outcome::Failure(ErrorValue::new(Error::from(err))));
            }
            self.invoke_now();
        }
    }

    /// Takes the payload and runs the callback under the captured context.
    /// Runs on whichever thread performs the delivery.
    fn invoke_now(&self) {
        let (callback, result, token) = self.inner.fsm.update(|state, data| {
            debug_assert_eq!(state, State::Done, "payload taken outside Done");
            let payload = (
                data.callback.take().expect("callback present in Done"),
                data.result.take().expect("result present in Done"),
                data.context.take(),
            );
            (None, payload)
        });
        trace!("delivering outcome");
        let _ctx = context::install(token.unwrap_or_default());
        callback(result);
    }

    /// Returns the active flag. Any thread.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Sets the active flag and attempts delivery, so re-enabling an armed
    /// core fires promptly. Any thread.
    pub fn activate(&self) {
        self.inner.active.store(true, Ordering::Release);
        self.maybe_fire();
    }

    /// Clears the active flag, suppressing delivery until a later
    /// [`activate`](Self::activate). Any thread. A no-op after `Done`.
    pub fn deactivate(&self) {
        self.inner.active.store(false, Ordering::Release);
    }

    /// Attaches (or clears) the executor the callback will be submitted
    /// to, with a priority hint. Consumer side.
    pub fn set_executor(&self, executor: Option<Arc<dyn Executor>>, priority: i8) {
        let mut slot = self.inner.executor.lock();
        slot.executor = executor;
        slot.priority = priority;
    }

    /// Returns the attached executor, if any. Any thread.
    #[must_use]
    pub fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.inner.executor.lock().executor.clone()
    }

    /// Records a cancellation request for the producer. Consumer side.
    ///
    /// At most one interrupt is ever recorded, and only while no result has
    /// been delivered; afterwards this is a no-op. If the producer has
    /// installed a handler it runs synchronously on this thread, after the
    /// interrupt lock is released.
    pub fn raise(&self, err: ErrorValue) {
        let delivery = self.inner.interrupt.raise(err, || self.has_result());
        if let Some((handler, interrupt)) = delivery {
            trace!("interrupt delivered to handler");
            handler(interrupt);
        }
    }

    /// Installs the producer's interrupt handler. Producer side.
    ///
    /// A no-op after a result has been delivered. If an interrupt was
    /// already raised, the handler runs immediately on this thread with a
    /// copy of it.
    pub fn set_interrupt_handler<F>(&self, handler: F)
    where
        F: FnOnce(ErrorValue) + Send + 'static,
    {
        let delivery = self
            .inner
            .interrupt
            .install(Box::new(handler), || self.has_result());
        if let Some((handler, interrupt)) = delivery {
            trace!("stored interrupt delivered to new handler");
            handler(interrupt);
        }
    }

    /// Returns true if an interrupt has been raised. Any thread.
    #[must_use]
    pub fn has_interrupt(&self) -> bool {
        self.inner.interrupt.has_interrupt()
    }

    /// Consumer-handle teardown: re-enables delivery so a suppressed
    /// callback can still fire, then the caller drops its share.
    pub fn detach_future(&self) {
        self.activate();
    }

    /// Producer-handle teardown: if no result was ever delivered, a
    /// broken-promise failure is delivered in its place; then the caller
    /// drops its share.
    ///
    /// By contract this never races `set_result` (both are producer-side
    /// operations on the same handle).
    pub fn detach_promise(&self) {
        if !self.has_result() {
            self.set_result(Outcome::Failure(ErrorValue::broken_promise()))
                .expect("detach_promise never races set_result");
        }
    }
}

impl<T: Send + 'static> Default for Core<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Core<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("state", &self.inner.fsm)
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{EnqueueError, ManualExecutor};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    fn recorder<T: Send + 'static>() -> (
        Arc<StdMutex<Vec<Outcome<T>>>>,
        impl FnOnce(Outcome<T>) + Send + 'static,
    ) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |outcome| {
            sink.lock().expect("recorder poisoned").push(outcome);
        })
    }

    #[test]
    fn result_then_callback_fires_with_value() {
        let core = Core::new();
        core.set_result(Outcome::Value(7)).expect("first result");
        assert!(core.has_result());

        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");

        let seen = seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value(), Some(&7));
    }

    #[test]
    fn callback_then_result_fires_with_failure() {
        let core: Core<i32> = Core::new();
        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");
        assert!(!core.has_result());

        core.set_result(Outcome::Failure(ErrorValue::broken_promise()))
            .expect("first result");

        let seen = seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_failure());
    }

    #[test]
    fn second_result_is_a_logic_error() {
        let core = Core::new();
        core.set_result(Outcome::Value(1)).expect("first result");
        let err = core.set_result(Outcome::Value(2)).expect_err("second");
        assert_eq!(err.kind(), ErrorKind::ResultAlreadySet);

        // The stored result is untouched.
        assert_eq!(core.result().expect("ready").value(), Some(&1));
    }

    #[test]
    fn second_callback_is_a_logic_error() {
        let core: Core<i32> = Core::new();
        core.set_callback(|_| {}).expect("first callback");
        let err = core.set_callback(|_| {}).expect_err("second");
        assert_eq!(err.kind(), ErrorKind::CallbackAlreadySet);
    }

    #[test]
    fn result_accessor_tracks_lifecycle() {
        let core: Core<i32> = Core::new();
        assert_eq!(
            core.result().expect_err("empty").kind(),
            ErrorKind::NotReady
        );

        core.set_result(Outcome::Value(5)).expect("first result");
        assert_eq!(core.result().expect("ready").value(), Some(&5));

        core.set_callback(|_| {}).expect("first callback");
        assert_eq!(
            core.result().expect_err("delivered").kind(),
            ErrorKind::ResultConsumed
        );
    }

    #[test]
    fn deactivate_suppresses_until_activate() {
        let core = Core::new();
        core.deactivate();

        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");
        core.set_result(Outcome::Value(3)).expect("first result");

        assert!(seen.lock().expect("recorder poisoned").is_empty());
        assert!(core.has_result());

        core.activate();
        let seen = seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value(), Some(&3));
    }

    #[test]
    fn activate_and_deactivate_are_idempotent() {
        let core: Core<i32> = Core::new();
        core.deactivate();
        core.deactivate();
        assert!(!core.is_active());
        core.activate();
        core.activate();
        assert!(core.is_active());
    }

    #[test]
    fn with_result_starts_fulfilled() {
        let core = Core::with_result(Outcome::Value(11));
        assert!(core.is_ready());

        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");
        assert_eq!(
            seen.lock().expect("recorder poisoned")[0].value(),
            Some(&11)
        );
    }

    #[test]
    fn detach_promise_synthesizes_broken_promise() {
        let core: Core<i32> = Core::new();
        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");

        core.detach_promise();

        let seen = seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1);
        let failure = seen[0].failure().expect("broken promise failure");
        assert_eq!(
            failure.downcast_ref::<Error>().expect("crate error").kind(),
            ErrorKind::BrokenPromise
        );
    }

    #[test]
    fn detach_promise_after_result_changes_nothing() {
        let core = Core::new();
        core.set_result(Outcome::Value(9)).expect("first result");
        core.detach_promise();
        assert_eq!(core.result().expect("ready").value(), Some(&9));
    }

    #[test]
    fn shares_drop_to_zero_destroys_state() {
        let core: Core<i32> = Core::new();
        let weak = Arc::downgrade(&core.inner);

        let producer = core.clone();
        let consumer = core.clone();
        drop(core);
        assert!(weak.upgrade().is_some());

        producer.set_result(Outcome::Value(1)).expect("first result");
        consumer.set_callback(|_| {}).expect("first callback");
        consumer.detach_future();
        producer.detach_promise();
        drop(producer);
        drop(consumer);

        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn executor_task_holds_a_transient_share() {
        let exec = Arc::new(ManualExecutor::new());
        let core: Core<i32> = Core::new();
        let weak = Arc::downgrade(&core.inner);
        core.set_executor(Some(exec.clone()), crate::executor::NO_PRIORITY);

        let fired = Arc::new(AtomicUsize::new(0));
        let sensor = Arc::clone(&fired);
        core.set_callback(move |outcome| {
            assert_eq!(outcome.value(), Some(&4));
            sensor.fetch_add(1, Ordering::SeqCst);
        })
        .expect("first callback");
        core.set_result(Outcome::Value(4)).expect("first result");

        // Queued, not yet run; the task's share keeps the state alive after
        // the last handle drops.
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        drop(core);
        assert!(weak.upgrade().is_some());

        assert_eq!(exec.run_all(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn enqueue_failure_delivers_dispatch_failure_inline() {
        struct Refusing;
        impl Executor for Refusing {
            fn enqueue(&self, _task: Task) -> std::result::Result<(), EnqueueError> {
                Err(EnqueueError::QueueFull)
            }
        }

        let core: Core<i32> = Core::new();
        core.set_executor(Some(Arc::new(Refusing)), crate::executor::NO_PRIORITY);

        let (seen, record) = recorder();
        core.set_callback(record).expect("first callback");
        core.set_result(Outcome::Value(6)).expect("first result");

        let seen = seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1);
        let failure = seen[0].failure().expect("dispatch failure");
        assert_eq!(
            failure.downcast_ref::<Error>().expect("crate error").kind(),
            ErrorKind::DispatchFailed
        );
    }

    #[test]
    fn interrupt_round_trip_through_core() {
        let core: Core<i32> = Core::new();
        let seen = Arc::new(StdMutex::new(None));

        let sink = Arc::clone(&seen);
        core.set_interrupt_handler(move |err| {
            *sink.lock().expect("sink poisoned") = Some(err);
        });
        assert!(!core.has_interrupt());

        core.raise(ErrorValue::broken_promise());
        assert!(core.has_interrupt());
        assert!(seen.lock().expect("sink poisoned").is_some());
    }

    #[test]
    fn raise_after_result_is_a_no_op() {
        let core = Core::new();
        core.set_result(Outcome::Value(1)).expect("first result");
        core.raise(ErrorValue::broken_promise());
        assert!(!core.has_interrupt());
    }
}
