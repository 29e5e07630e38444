//! Single-slot interrupt channel from consumer to producer.
//!
//! The two sides race: whichever of the interrupt and the handler arrives
//! second triggers delivery. The (check result, check interrupt, act)
//! sequence is atomic under the cell's lock, but the handler itself is
//! always invoked by the caller *after* the lock has been released, so the
//! lock is never held across user code.
//!
//! The stored interrupt is not cleared by delivery: a handler installed
//! after delivery fires with it again, which lets a producer re-register
//! after handing its handle to other code.

use crate::types::ErrorValue;
use parking_lot::Mutex;

/// A producer-side handler for a raised interrupt.
pub(crate) type InterruptHandler = Box<dyn FnOnce(ErrorValue) + Send>;

/// A pending delivery returned from a locked section, to be fired by the
/// caller once the lock is released.
pub(crate) type PendingDelivery = (InterruptHandler, ErrorValue);

#[derive(Default)]
struct Slots {
    /// The raised interrupt, recorded at most once.
    interrupt: Option<ErrorValue>,
    /// The registered handler, consumed on delivery.
    handler: Option<InterruptHandler>,
}

/// The interrupt slot pair under a single short-critical-section lock.
#[derive(Default)]
pub(crate) struct InterruptCell {
    slots: Mutex<Slots>,
}

impl InterruptCell {
    /// Records `err` as the interrupt, unless a result has already been
    /// delivered or an interrupt is already recorded. Returns the handler
    /// to fire, if one was installed.
    ///
    /// `result_present` is evaluated under the lock.
    pub(crate) fn raise(
        &self,
        err: ErrorValue,
        result_present: impl FnOnce() -> bool,
    ) -> Option<PendingDelivery> {
        let mut slots = self.slots.lock();
        if slots.interrupt.is_some() || result_present() {
            return None;
        }
        let handler = slots.handler.take();
        slots.interrupt = Some(err.clone());
        handler.map(|h| (h, err))
    }

    /// Installs `handler`, unless a result has already been delivered (the
    /// handler is then dropped). If an interrupt is already recorded, the
    /// handler is returned with a copy of it for immediate delivery.
    pub(crate) fn install(
        &self,
        handler: InterruptHandler,
        result_present: impl FnOnce() -> bool,
    ) -> Option<PendingDelivery> {
        let mut slots = self.slots.lock();
        if result_present() {
            return None;
        }
        match &slots.interrupt {
            Some(err) => Some((handler, err.clone())),
            None => {
                slots.handler = Some(handler);
                None
            }
        }
    }

    /// Returns true if an interrupt has been recorded.
    pub(crate) fn has_interrupt(&self) -> bool {
        self.slots.lock().interrupt.is_some()
    }
}
