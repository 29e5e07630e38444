//! Atomic state cell with in-transition effects.
//!
//! [`Fsm`] stores a small state enum in an `AtomicU8` and the data published
//! by transitions behind a mutex. A transition compares the current state
//! under the lock, runs its effect against the data, then publishes the next
//! state with a release store, so any thread that observes the new state
//! also observes the published data once it reaches it through the lock.
//!
//! Concurrent writers serialize only on this cell; there is no coarse mutex
//! across the owning object. [`Fsm::transition_then`] additionally runs a
//! second closure after the lock is released, which is how user callbacks
//! are kept outside the critical section.

use core::fmt;
use parking_lot::{Mutex, MutexGuard};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// A state enum that can round-trip through a single byte.
pub(crate) trait StateBits: Copy + Eq + fmt::Debug {
    /// Packs the state into its byte representation.
    fn into_bits(self) -> u8;
    /// Unpacks a byte previously produced by [`StateBits::into_bits`].
    fn from_bits(bits: u8) -> Self;
}

/// An atomic state cell plus the data its transitions publish.
pub(crate) struct Fsm<S, D> {
    /// Current state. Release-stored by transitions, acquire-loaded by
    /// wait-free observers.
    state: AtomicU8,
    /// Data mutated by transition effects, reachable only under the lock.
    data: Mutex<D>,
    _marker: PhantomData<S>,
}

impl<S: StateBits, D> Fsm<S, D> {
    /// Creates a cell in `initial` holding `data`.
    pub(crate) fn new(initial: S, data: D) -> Self {
        Self {
            state: AtomicU8::new(initial.into_bits()),
            data: Mutex::new(data),
            _marker: PhantomData,
        }
    }

    /// Current state. Wait-free; callable from any thread.
    pub(crate) fn state(&self) -> S {
        S::from_bits(self.state.load(Ordering::Acquire))
    }

    /// Locks the published data for direct inspection.
    ///
    /// Held guards block transitions; keep the scope short.
    pub(crate) fn lock_data(&self) -> MutexGuard<'_, D> {
        self.data.lock()
    }

    /// If the current state is `from`, runs `effect` against the data and
    /// publishes `to`. Returns whether the transition happened.
    pub(crate) fn transition<F>(&self, from: S, to: S, effect: F) -> bool
    where
        F: FnOnce(&mut D),
    {
        self.transition_then(from, to, effect, |()| {})
    }

    /// As [`Fsm::transition`], but the value produced by `effect` is handed
    /// to `after` once the lock has been released. Used to invoke consumer
    /// callbacks outside the critical section.
    pub(crate) fn transition_then<F, R, A>(&self, from: S, to: S, effect: F, after: A) -> bool
    where
        F: FnOnce(&mut D) -> R,
        A: FnOnce(R),
    {
        let deferred = {
            let mut data = self.data.lock();
            if S::from_bits(self.state.load(Ordering::Relaxed)) != from {
                return false;
            }
            let out = effect(&mut data);
            self.state.store(to.into_bits(), Ordering::Release);
            out
        };
        after(deferred);
        true
    }

    /// Locked dispatch over the current state, for operations with several
    /// legal source states. `step` receives the state and the data and
    /// returns the next state to publish (or `None` to stay) plus a result.
    ///
    /// The decision is made while the lock is held, so unlike a
    /// compare-and-swap loop there is no spurious-conflict retry.
    pub(crate) fn update<R, F>(&self, step: F) -> R
    where
        F: FnOnce(S, &mut D) -> (Option<S>, R),
    {
        let mut data = self.data.lock();
        let current = S::from_bits(self.state.load(Ordering::Relaxed));
        let (next, out) = step(current, &mut data);
        if let Some(next) = next {
            self.state.store(next.into_bits(), Ordering::Release);
        }
        out
    }
}

impl<S: StateBits, D> fmt::Debug for Fsm<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm").field("state", &self.state()).finish()
    }
}
