//! Rendezvous: the shared-state core of a single-assignment future/promise pair.
//!
//! # Overview
//!
//! A rendezvous [`Core`] is the object jointly referenced by a producer
//! (promise side) and a consumer (future side). It mediates three concerns
//! that must be correct under concurrent access from two independently
//! owning threads:
//!
//! 1. Single-assignment delivery of an [`Outcome`] (value or failure) from
//!    producer to consumer.
//! 2. Registration of a continuation that fires exactly once, in the right
//!    execution context, once both the result and the callback are present
//!    and firing has not been suppressed.
//! 3. Interrupt signalling in the reverse direction, from consumer to
//!    producer, without racing result delivery.
//!
//! # Core Guarantees
//!
//! - **Fire-once**: the registered callback is invoked at most once, only on
//!   the Armed→Done transition, and only while the core is active.
//! - **Set-once**: a second `set_result` or `set_callback` is a surfaced
//!   logic error, never silent replacement.
//! - **No polling**: consumers never spin; whichever side arrives second
//!   triggers delivery.
//! - **No silent teardown**: a producer dropped without a result delivers a
//!   broken-promise failure to the consumer.
//! - **Joint ownership**: the core is destroyed exactly once, after both
//!   endpoints and any in-flight executor task have released their shares.
//!
//! # Module Structure
//!
//! - [`types`]: the [`Outcome`] union and the erased [`ErrorValue`] carrier
//! - [`core`]: the shared core object and its state machine
//! - [`handle`]: thin [`Promise`] / [`Future`] endpoint handles
//! - [`collect`]: variadic fan-in ([`collect_all`], [`try_collect`])
//! - [`executor`]: the [`Executor`] trait plus in-tree executors
//! - [`context`]: request-context capture/install around callback delivery
//! - [`error`]: error types
//! - [`tracing_compat`]: feature-gated structured logging macros
//! - [`test_utils`]: helpers shared by unit and integration tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::module_inception)]

pub mod collect;
pub mod context;
pub mod core;
pub mod error;
pub mod executor;
pub mod handle;
pub mod test_utils;
pub mod tracing_compat;
pub mod types;

mod fsm;
mod interrupt;

pub use crate::core::Core;
pub use collect::{collect_all, try_collect, FanIn};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use executor::{EnqueueError, Executor, ManualExecutor, PoolConfig, PriorityPool, Task};
pub use handle::{pair, Future, Promise};
pub use types::{ErrorValue, Outcome};
