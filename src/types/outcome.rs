//! Two-valued outcome type.
//!
//! An [`Outcome`] is the result of a producer-side computation, delivered
//! exactly once to the consumer:
//!
//! - `Value(T)`: success with a value
//! - `Failure(ErrorValue)`: failure carrying an erased error
//!
//! Unlike `Result`, the failure arm is always the erased [`ErrorValue`]
//! carrier, so outcomes of different computations compose into tuples and
//! can cross the producer/consumer boundary without generic error plumbing.

use super::ErrorValue;
use core::fmt;

/// The outcome of a single-assignment computation.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Success with a value.
    Value(T),
    /// Failure carrying an erased error.
    Failure(ErrorValue),
}

impl<T> Outcome<T> {
    /// Returns true if this outcome is a `Value`.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if this outcome is a `Failure`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns a reference to the value, if present.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Returns a reference to the failure, if present.
    #[must_use]
    pub const fn failure(&self) -> Option<&ErrorValue> {
        match self {
            Self::Value(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Maps the failure using the provided function.
    #[must_use]
    pub fn map_failure<F: FnOnce(ErrorValue) -> ErrorValue>(self, f: F) -> Self {
        match self {
            Self::Value(v) => Self::Value(v),
            Self::Failure(e) => Self::Failure(f(e)),
        }
    }

    /// Converts this outcome into a standard `Result`.
    pub fn into_result(self) -> Result<T, ErrorValue> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a `Failure`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Value(v) => v,
            Self::Failure(e) => {
                panic!("called `Outcome::unwrap()` on a `Failure` value: {e}")
            }
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Value(v) => v,
            Self::Failure(_) => default,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Failure(ErrorValue::new(e)),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "value: {v}"),
            Self::Failure(e) => write!(f, "failure: {e}"),
        }
    }
}
