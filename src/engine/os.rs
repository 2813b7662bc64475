//! OS-native engine.
//!
//! Delegates entirely to a blocking platform mutex. `enter` never spins, so
//! `max_spins` and `max_delay` are ignored.

#![allow(unsafe_code)]

use super::{DebugState, LockEngine};
use crate::latch::{CallSite, LatchId, LockWord};
use crate::policy::{MutexPolicy, NoPolicy};
use crate::tracing_compat::debug;
use parking_lot::RawMutex;
use parking_lot::lock_api::RawMutex as _;

/// Platform mutex with debug-only freed/locked tracking.
pub struct OsEngine<P: MutexPolicy = NoPolicy> {
    raw: RawMutex,
    debug: DebugState,
    policy: P,
}

impl<P: MutexPolicy> Default for OsEngine<P> {
    fn default() -> Self {
        Self {
            raw: RawMutex::INIT,
            debug: DebugState::new(),
            policy: P::default(),
        }
    }
}

impl<P: MutexPolicy> OsEngine<P> {
    /// Creates a freed engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug builds: whether the engine is freed. `None` in release builds.
    #[must_use]
    pub fn is_freed(&self) -> Option<bool> {
        self.debug.is_freed()
    }
}

impl<P: MutexPolicy> LockEngine for OsEngine<P> {
    type Policy = P;

    const NAME: &'static str = "os";

    fn init(&mut self, id: LatchId, _site: CallSite) {
        self.debug.on_init(Self::NAME);
        debug_assert!(!self.raw.is_locked(), "os: init while locked");
        self.raw = RawMutex::INIT;
        debug!(latch = %id, engine = Self::NAME, "mutex initialised");
    }

    fn destroy(&mut self) {
        self.debug.on_destroy(Self::NAME);
        debug_assert!(!self.raw.is_locked(), "os: destroy while locked");
    }

    fn enter(&self, _max_spins: u32, _max_delay: u32, _site: CallSite) {
        self.debug.check_usable(Self::NAME);
        self.raw.lock();
        self.debug.on_locked(Self::NAME);
    }

    fn try_lock(&self) -> bool {
        self.debug.check_usable(Self::NAME);
        let locked = self.raw.try_lock();
        if locked {
            self.debug.on_locked(Self::NAME);
        }
        locked
    }

    fn exit(&self) {
        self.debug.on_unlock(Self::NAME);
        self.debug.check_usable(Self::NAME);
        // SAFETY: the exit contract requires the caller to hold the lock,
        // which it acquired through `enter` or `try_lock` on this engine.
        unsafe { self.raw.unlock() };
    }

    fn state(&self) -> LockWord {
        if self.raw.is_locked() {
            LockWord::Locked
        } else {
            LockWord::Unlocked
        }
    }

    fn policy(&self) -> &P {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }
}

impl<P: MutexPolicy> std::fmt::Debug for OsEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsEngine")
            .field("state", &self.state())
            .field("freed", &self.debug.is_freed())
            .finish_non_exhaustive()
    }
}
