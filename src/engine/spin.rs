//! Test-and-test-and-set spin engine.
//!
//! Never blocks in the kernel. Each failed attempt busy-waits a random delay
//! bounded by `max_delay`; every time the failure count reaches the current
//! budget the thread yields and the budget grows by the original
//! `max_spins`.

use super::{DebugState, LOCKED, LockEngine, UNLOCKED, debug_check_aligned};
use crate::latch::{CallSite, LatchId, LockWord};
use crate::policy::{MutexPolicy, NoPolicy};
use crate::tracing_compat::debug;
use crate::util::{random_delay, yield_now};
use std::sync::atomic::{AtomicU32, Ordering};

/// Pure spin mutex over a two-state lock word.
pub struct SpinEngine<P: MutexPolicy = NoPolicy> {
    lock_word: AtomicU32,
    debug: DebugState,
    policy: P,
}

impl<P: MutexPolicy> Default for SpinEngine<P> {
    fn default() -> Self {
        Self {
            lock_word: AtomicU32::new(UNLOCKED),
            debug: DebugState::new(),
            policy: P::default(),
        }
    }
}

impl<P: MutexPolicy> SpinEngine<P> {
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

impl<P: MutexPolicy> LockEngine for SpinEngine<P> {
    type Policy = P;

    const NAME: &'static str = "spin";

    fn init(&mut self, id: LatchId, _site: CallSite) {
        debug_check_aligned(&self.lock_word, Self::NAME);
        self.debug.on_init(Self::NAME);
        debug_assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "spin: init while locked"
        );
        debug!(latch = %id, engine = Self::NAME, "mutex initialised");
    }

    fn destroy(&mut self) {
        debug_assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "spin: destroy while locked"
        );
        self.debug.on_destroy(Self::NAME);
    }

    fn enter(&self, max_spins: u32, max_delay: u32, _site: CallSite) {
        self.debug.check_usable(Self::NAME);

        let step = max_spins.max(1);
        let mut budget = step;
        let mut n_spins: u32 = 0;

        while !self.try_lock() {
            random_delay(max_delay);
            n_spins = n_spins.wrapping_add(1);
            if n_spins == budget {
                yield_now();
                budget = budget.wrapping_add(step);
            }
        }

        self.policy.add(n_spins, 0);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.debug.check_usable(Self::NAME);
        self.lock_word.load(Ordering::Relaxed) == UNLOCKED
            && self
                .lock_word
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    #[inline]
    fn exit(&self) {
        self.debug.check_usable(Self::NAME);
        debug_assert_eq!(
            self.lock_word.load(Ordering::Relaxed),
            LOCKED,
            "spin: exit of a mutex that is not locked"
        );
        self.lock_word.store(UNLOCKED, Ordering::Release);
    }

    fn state(&self) -> LockWord {
        LockWord::from_raw(self.lock_word.load(Ordering::Relaxed))
    }

    fn policy(&self) -> &P {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }
}

impl<P: MutexPolicy> std::fmt::Debug for SpinEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinEngine")
            .field("state", &self.state())
            .field("freed", &self.debug.is_freed())
            .finish_non_exhaustive()
    }
}
