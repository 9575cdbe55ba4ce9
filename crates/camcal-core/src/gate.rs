use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camcal_types::{Event, EventMask};
use tokio_util::sync::CancellationToken;

struct GateInner {
    pending: Event,
    mask: EventMask,
}

/// Single-slot mailbox for UI events, gated by an acceptance mask
///
/// Posting never blocks. A newer accepted event overwrites an unconsumed one.
pub struct EventGate {
    inner: Mutex<GateInner>,
    cond: Condvar,
}

impl EventGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                pending: Event::None,
                mask: EventMask::NONE,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the event was accepted under the current mask
    pub fn post(&self, event: Event) -> bool {
        let mut inner = self.lock();
        if !inner.mask.accepts(event) {
            return false;
        }
        inner.pending = event;
        self.cond.notify_one();
        true
    }

    /// Replaces the mask, dropping a pending event the new mask no longer accepts
    pub fn set_mask(&self, mask: EventMask) {
        let mut inner = self.lock();
        inner.mask = mask;
        if inner.pending != Event::None && !mask.accepts(inner.pending) {
            tracing::debug!("Dropping stale {:?} under new mask", inner.pending);
            inner.pending = Event::None;
        }
    }

    pub fn mask(&self) -> EventMask {
        self.lock().mask
    }

    /// Blocks until an event arrives or `cancel` fires
    ///
    /// The wait is re-entered every `poll` so cancellation is observed even
    /// without an explicit [`EventGate::interrupt`]. Returns `None` when cancelled.
    pub fn wait(&self, cancel: &CancellationToken, poll: Duration) -> Option<Event> {
        let mut inner = self.lock();
        while inner.pending == Event::None && !cancel.is_cancelled() {
            inner = match self.cond.wait_timeout(inner, poll) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        if cancel.is_cancelled() {
            return None;
        }
        let event = inner.pending;
        inner.pending = Event::None;
        Some(event)
    }

    /// Wakes any waiter so it re-checks its cancellation token
    pub fn interrupt(&self) {
        let _inner = self.lock();
        self.cond.notify_all();
    }

    /// Drops any pending event and closes the mask
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.pending = Event::None;
        inner.mask = EventMask::NONE;
    }
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new()
    }
}
