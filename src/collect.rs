//! Variadic fan-in over heterogeneous futures.
//!
//! Two shapes of aggregation over a tuple of inputs:
//!
//! - [`collect_all`]: tolerates individual failures; the combined outcome
//!   is the full tuple of per-input outcomes and never fails as an
//!   aggregate.
//! - [`try_collect`]: short-circuits; the first failure becomes the
//!   combined outcome immediately, otherwise the tuple of values is
//!   published once every input has delivered.
//!
//! Each input gets a small callback that reports its partial result to a
//! shared, heap-allocated context and then releases its share of it. The
//! context publishes on an embedded promise when the last share drops, so
//! completion order never matters. The tuple unfolding is `macro_rules!`
//! generated for arities 1 through 6.

use crate::error::Result;
use crate::handle::{pair, Future, Promise};
use crate::types::{ErrorValue, Outcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A tuple of per-input outcome slots, completed into a tuple of outcomes.
trait OutcomeSlots: Default + Send + 'static {
    /// The published tuple type.
    type Complete: Send + 'static;
    /// Completes the slots; an unfilled slot becomes a broken-promise
    /// failure (its input was torn down without ever delivering).
    fn complete(self) -> Self::Complete;
}

/// A tuple of per-input value slots, completed into a tuple of values.
trait ValueSlots: Default + Send + 'static {
    /// The published tuple type.
    type Complete: Send + 'static;
    /// Completes the slots; `None` if any slot is unfilled.
    fn complete(self) -> Option<Self::Complete>;
}

/// Failure-tolerant aggregation context. Publishes the full outcome tuple
/// when the last share drops.
struct AllContext<S: OutcomeSlots> {
    promise: Option<Promise<S::Complete>>,
    slots: Mutex<S>,
}

impl<S: OutcomeSlots> Drop for AllContext<S> {
    fn drop(&mut self) {
        if let Some(promise) = self.promise.take() {
            let slots = std::mem::take(&mut *self.slots.lock());
            let _ = promise.set_value(slots.complete());
        }
    }
}

/// Short-circuit aggregation context. The first failure wins the flag and
/// publishes immediately; the value tuple is published from `Drop` only if
/// nothing ever failed.
struct TryContext<S: ValueSlots> {
    promise: Mutex<Option<Promise<S::Complete>>>,
    slots: Mutex<S>,
    failed: AtomicBool,
}

impl<S: ValueSlots> TryContext<S> {
    fn fail(&self, err: ErrorValue) {
        if !self.failed.swap(true, Ordering::AcqRel) {
            // Take the promise first; publishing runs user callbacks and
            // must happen with no context lock held.
            let promise = self.promise.lock().take();
            if let Some(promise) = promise {
                let _ = promise.set_error(err);
            }
        }
    }
}

impl<S: ValueSlots> Drop for TryContext<S> {
    fn drop(&mut self) {
        if self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        let promise = self.promise.lock().take();
        let slots = std::mem::take(&mut *self.slots.lock());
        if let Some(promise) = promise {
            match slots.complete() {
                Some(values) => {
                    let _ = promise.set_value(values);
                }
                // An input was torn down without delivering; surface it
                // rather than publishing a partial tuple.
                None => {
                    let _ = promise.set_error(ErrorValue::broken_promise());
                }
            }
        }
    }
}

/// A tuple of futures that can be fanned in.
///
/// Implemented for tuples of [`Future`] handles up to arity 6. Prefer the
/// free functions [`collect_all`] and [`try_collect`].
pub trait FanIn {
    /// Output of [`collect_all`]: the tuple of per-input outcomes.
    type AllOutput: Send + 'static;
    /// Output of [`try_collect`]: the tuple of per-input values.
    type TryOutput: Send + 'static;

    /// See [`collect_all`].
    fn collect_all(self) -> Result<Future<Self::AllOutput>>;

    /// See [`try_collect`].
    fn try_collect(self) -> Result<Future<Self::TryOutput>>;
}

/// Fans in a tuple of futures, tolerating individual failures.
///
/// The returned future delivers the full tuple of outcomes once every input
/// has delivered (or been torn down). Fails only if an input already had a
/// callback registered, which is a caller logic error.
pub fn collect_all<I: FanIn>(inputs: I) -> Result<Future<I::AllOutput>> {
    inputs.collect_all()
}

/// Fans in a tuple of futures, short-circuiting on the first failure.
///
/// The returned future delivers either the tuple of values or the first
/// failure, regardless of completion order. Fails only if an input already
/// had a callback registered.
pub fn try_collect<I: FanIn>(inputs: I) -> Result<Future<I::TryOutput>> {
    inputs.try_collect()
}

macro_rules! impl_fan_in {
    ($(($T:ident, $input:ident, $idx:tt)),+) => {
        impl<$($T: Send + 'static),+> OutcomeSlots for ($(Option<Outcome<$T>>,)+) {
            type Complete = ($(Outcome<$T>,)+);

            fn complete(self) -> Self::Complete {
                ($(
                    self.$idx
                        .unwrap_or_else(|| Outcome::Failure(ErrorValue::broken_promise())),
                )+)
            }
        }

        impl<$($T: Send + 'static),+> ValueSlots for ($(Option<$T>,)+) {
            type Complete = ($($T,)+);

            fn complete(self) -> Option<Self::Complete> {
                Some(($(self.$idx?,)+))
            }
        }

        impl<$($T: Send + 'static),+> FanIn for ($(Future<$T>,)+) {
            type AllOutput = ($(Outcome<$T>,)+);
            type TryOutput = ($($T,)+);

            fn collect_all(self) -> Result<Future<Self::AllOutput>> {
                let ($($input,)+) = self;
                let (promise, future) = pair();
                let ctx = Arc::new(AllContext::<($(Option<Outcome<$T>>,)+)> {
                    promise: Some(promise),
                    slots: Mutex::new(Default::default()),
                });
                $(
                    let shared = Arc::clone(&ctx);
                    $input.set_callback(move |outcome| {
                        shared.slots.lock().$idx = Some(outcome);
                    })?;
                )+
                Ok(future)
            }

            fn try_collect(self) -> Result<Future<Self::TryOutput>> {
                let ($($input,)+) = self;
                let (promise, future) = pair();
                let ctx = Arc::new(TryContext::<($(Option<$T>,)+)> {
                    promise: Mutex::new(Some(promise)),
                    slots: Mutex::new(Default::default()),
                    failed: AtomicBool::new(false),
                });
                $(
                    let shared = Arc::clone(&ctx);
                    $input.set_callback(move |outcome| match outcome {
                        Outcome::Value(value) => {
                            if !shared.failed.load(Ordering::Acquire) {
                                shared.slots.lock().$idx = Some(value);
                            }
                        }
                        Outcome::Failure(err) => shared.fail(err),
                    })?;
                )+
                Ok(future)
            }
        }
    };
}

impl_fan_in!((T0, input0, 0));
impl_fan_in!((T0, input0, 0), (T1, input1, 1));
impl_fan_in!((T0, input0, 0), (T1, input1, 1), (T2, input2, 2));
impl_fan_in!(
    (T0, input0, 0),
    (T1, input1, 1),
    (T2, input2, 2),
    (T3, input3, 3)
);
impl_fan_in!(
    (T0, input0, 0),
    (T1, input1, 1),
    (T2, input2, 2),
    (T3, input3, 3),
    (T4, input4, 4)
);
impl_fan_in!(
    (T0, input0, 0),
    (T1, input1, 1),
    (T2, input2, 2),
    (T3, input3, 3),
    (T4, input4, 4),
    (T5, input5, 5)
);
