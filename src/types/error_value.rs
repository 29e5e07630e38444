//! Erased error carrier.
//!
//! [`ErrorValue`] holds any `std::error::Error` behind an `Arc`, so it is
//! cheap to clone and can be inspected without being consumed. This is what
//! lets the interrupt handler look at a raised error while the same error
//! remains stored for later handler registrations.

use crate::error::{Error, ErrorKind};
use core::fmt;
use std::sync::Arc;

/// A cheaply clonable, type-erased error.
#[derive(Clone)]
pub struct ErrorValue {
    inner: Arc<dyn std::error::Error + Send + Sync>,
}

impl ErrorValue {
    /// Wraps a concrete error.
    #[must_use]
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(err),
        }
    }

    /// The failure delivered when a producer is detached without ever
    /// setting a result.
    #[must_use]
    pub fn broken_promise() -> Self {
        Self::new(Error::new(ErrorKind::BrokenPromise))
    }

    /// Returns true if the wrapped error is of type `E`.
    #[must_use]
    pub fn is<E: std::error::Error + 'static>(&self) -> bool {
        self.inner.as_ref().is::<E>()
    }

    /// Attempts to view the wrapped error as type `E`.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.inner.as_ref().downcast_ref::<E>()
    }

    /// Returns the wrapped error as a trait object, for source chains.
    #[must_use]
    pub fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl From<Error> for ErrorValue {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}
