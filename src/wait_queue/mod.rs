//! Wait-queue contract used by the event engine.
//!
//! The event engine does not block threads itself. Once its spin phase is
//! exhausted it hands itself to a [`WaitQueue`] as an opaque [`WaitObject`]
//! (wake handle plus lock-word predicate) and asks to be parked.
//! [`SyncArray`] is the default service.
//!
//! Wakes are at-least-once: duplicate or spurious wakes are harmless because
//! a woken thread always re-runs its acquisition loop.

mod sync_array;

pub use sync_array::{MonitorHandle, ParkedThread, SyncArray, SyncArrayStats};

use crate::event::WakeEvent;
use crate::latch::{CallSite, LatchId};

/// What a wait queue may see of a mutex it parks a thread on.
///
/// The queue never owns the object and must not retain it past the `park`
/// call that handed it over.
pub trait WaitObject: Send + Sync {
    /// Identity of the mutex.
    fn latch_id(&self) -> LatchId;

    /// Wake handle parked threads block on. `None` once destroyed.
    fn wake_event(&self) -> Option<&WakeEvent>;

    /// Whether some thread holds the mutex.
    fn is_locked(&self) -> bool;

    /// Announces that a thread may be about to sleep on the mutex.
    fn set_waiters(&self);

    /// Attempts to acquire the mutex without blocking.
    fn try_lock(&self) -> bool;
}

/// External service that parks threads on mutexes.
pub trait WaitQueue: Send + Sync {
    /// Parks the calling thread on `object`.
    ///
    /// The queue resets the object's wake event, announces the waiter, and
    /// retries `try_lock` up to `retries` times (at least once) before
    /// sleeping. Returns true
    /// if one of those retries acquired the mutex; false after a wake, in
    /// which case the caller must try again.
    fn park(&self, object: &(dyn WaitObject + 'static), site: CallSite, retries: u32) -> bool;

    /// Records that `object` was released with waiters announced and its
    /// event has been set.
    fn wake(&self, object: &(dyn WaitObject + 'static));
}
