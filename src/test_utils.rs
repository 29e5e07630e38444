//! Helpers shared by unit and integration tests.
//!
//! Nothing here is runtime machinery; the types exist so tests can observe
//! exactly-once delivery and teardown without hand-rolling the same
//! `Arc<Mutex<Vec<_>>>` plumbing in every file.

use crate::types::Outcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every outcome a callback receives.
///
/// The callback closure and the recorder share storage, so a test can hand
/// the closure to `set_callback` and assert on what arrived afterwards.
#[derive(Debug)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<Outcome<T>>>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Send + 'static> Recorder<T> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends its outcome to this recorder.
    #[must_use]
    pub fn callback(&self) -> impl FnOnce(Outcome<T>) + Send + 'static {
        let sink = Arc::clone(&self.seen);
        move |outcome| {
            sink.lock().expect("recorder poisoned").push(outcome);
        }
    }

    /// How many outcomes have been recorded.
    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.lock().expect("recorder poisoned").len()
    }

    /// Takes all recorded outcomes.
    #[must_use]
    pub fn take(&self) -> Vec<Outcome<T>> {
        std::mem::take(&mut *self.seen.lock().expect("recorder poisoned"))
    }

    /// Takes the single recorded outcome, asserting exactly one arrived.
    #[must_use]
    #[track_caller]
    pub fn single(&self) -> Outcome<T> {
        let mut seen = self.seen.lock().expect("recorder poisoned");
        assert_eq!(seen.len(), 1, "expected exactly one delivery");
        seen.pop().expect("just checked")
    }
}

/// A value whose drop is observable through a [`DropProbe`].
///
/// Useful as the `T` of a core when a test needs to see the shared state
/// being torn down (the stored value drops with it).
#[derive(Debug)]
pub struct DropSensor {
    hits: Arc<AtomicUsize>,
}

impl DropSensor {
    /// Creates a sensor and the probe that counts its drops.
    #[must_use]
    pub fn new() -> (Self, DropProbe) {
        let hits = Arc::new(AtomicUsize::new(0));
        (
            Self {
                hits: Arc::clone(&hits),
            },
            DropProbe { hits },
        )
    }
}

impl Drop for DropSensor {
    fn drop(&mut self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts how many times the paired [`DropSensor`] has dropped.
#[derive(Debug, Clone)]
pub struct DropProbe {
    hits: Arc<AtomicUsize>,
}

impl DropProbe {
    /// The number of observed drops.
    #[must_use]
    pub fn drops(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_accumulates_outcomes() {
        let recorder: Recorder<i32> = Recorder::new();
        assert_eq!(recorder.count(), 0);

        let callback = recorder.callback();
        callback(Outcome::Value(1));
        assert_eq!(recorder.count(), 1);
        assert_eq!(recorder.single().value(), Some(&1));
    }

    #[test]
    fn drop_sensor_counts_once_per_drop() {
        let (sensor, probe) = DropSensor::new();
        assert_eq!(probe.drops(), 0);
        drop(sensor);
        assert_eq!(probe.drops(), 1);
    }
}
