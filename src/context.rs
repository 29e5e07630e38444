//! Request-context propagation across the delivery hop.
//!
//! A [`RequestContext`] is an opaque bag of diagnostic key/value data that
//! logically belongs to a request, not a thread. The core captures the
//! current context as a [`Token`] when the consumer registers its callback
//! and installs it around the callback invocation, so logical-thread-local
//! state survives the asynchronous hop even when the callback runs on an
//! executor worker.
//!
//! Installation is RAII: [`install`] swaps the calling thread's current
//! context and returns a guard that restores the previous one on drop.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<RequestContext>>> = const { RefCell::new(None) };
}

/// An opaque bag of request-scoped diagnostic data.
#[derive(Debug, Default)]
pub struct RequestContext {
    values: Mutex<HashMap<String, String>>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores a value under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.lock().insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

/// A snapshot of a thread's current context, captured at callback
/// registration time.
#[derive(Debug, Clone, Default)]
pub struct Token(Option<Arc<RequestContext>>);

impl Token {
    /// Returns the captured context, if one was current.
    #[must_use]
    pub fn context(&self) -> Option<&Arc<RequestContext>> {
        self.0.as_ref()
    }
}

/// Captures the calling thread's current context.
#[must_use]
pub fn capture() -> Token {
    Token(CURRENT.with(|c| c.borrow().clone()))
}

/// Returns the calling thread's current context, if any.
#[must_use]
pub fn current() -> Option<Arc<RequestContext>> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Makes `ctx` the calling thread's current context, returning the
/// previous one.
pub fn set_current(ctx: Option<Arc<RequestContext>>) -> Option<Arc<RequestContext>> {
    CURRENT.with(|c| c.replace(ctx))
}

/// Installs a captured token on the calling thread for the lifetime of the
/// returned guard. Dropping the guard restores the previous context.
#[must_use]
pub fn install(token: Token) -> InstallGuard {
    InstallGuard {
        previous: set_current(token.0),
    }
}

/// Guard returned by [`install`]; restores the previous context on drop.
#[derive(Debug)]
pub struct InstallGuard {
    previous: Option<Arc<RequestContext>>,
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        set_current(self.previous.take());
    }
}
