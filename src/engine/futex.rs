//! Futex hybrid engine (Linux).
//!
//! Spins like the TTAS engine for up to `max_spins` attempts, then swaps the
//! lock word to `WAITERS` and sleeps in the kernel until a swap observes
//! `UNLOCKED`. The lock word is itself the futex, so no wait queue is
//! involved. A thread that acquires through the swap leaves the word at
//! `WAITERS`, which costs at most one spurious wake on exit.

use super::{DebugState, LOCKED, LockEngine, UNLOCKED, WAITERS, debug_check_aligned};
use crate::latch::{CallSite, LatchId, LockWord};
use crate::policy::{MutexPolicy, NoPolicy};
use crate::sys::futex;
use crate::tracing_compat::debug;
use crate::util::random_delay;
use std::sync::atomic::{AtomicU32, Ordering};

/// Spin-then-futex mutex over a three-state lock word.
pub struct FutexEngine<P: MutexPolicy = NoPolicy> {
    lock_word: AtomicU32,
    debug: DebugState,
    policy: P,
}

impl<P: MutexPolicy> Default for FutexEngine<P> {
    fn default() -> Self {
        Self {
            lock_word: AtomicU32::new(UNLOCKED),
            debug: DebugState::new(),
            policy: P::default(),
        }
    }
}

impl<P: MutexPolicy> FutexEngine<P> {
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

    fn spin(&self, max_spins: u32, max_delay: u32) -> Option<u32> {
        for n_spins in 0..max_spins {
            if self.try_lock() {
                return Some(n_spins);
            }
            random_delay(max_delay);
        }
        None
    }
}

impl<P: MutexPolicy> LockEngine for FutexEngine<P> {
    type Policy = P;

    const NAME: &'static str = "futex";

    fn init(&mut self, id: LatchId, _site: CallSite) {
        debug_check_aligned(&self.lock_word, Self::NAME);
        assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "futex: init of {id} while locked"
        );
        self.debug.on_init(Self::NAME);
        debug!(latch = %id, engine = Self::NAME, "mutex initialised");
    }

    fn destroy(&mut self) {
        assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "futex: destroy while locked"
        );
        self.debug.on_destroy(Self::NAME);
    }

    fn enter(&self, max_spins: u32, max_delay: u32, _site: CallSite) {
        self.debug.check_usable(Self::NAME);

        if let Some(n_spins) = self.spin(max_spins, max_delay) {
            self.policy.add(n_spins, 0);
            return;
        }

        let mut n_waits: u32 = 0;
        while self.lock_word.swap(WAITERS, Ordering::Acquire) != UNLOCKED {
            // EAGAIN means the word already moved; anything else is a bug in
            // the call, and the loop re-checks the word either way.
            if let Err(err) = futex::wait_if_equal(&self.lock_word, WAITERS) {
                debug_assert!(false, "futex: wait failed: {err}");
            }
            n_waits = n_waits.wrapping_add(1);
        }

        self.policy.add(max_spins, n_waits);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.debug.check_usable(Self::NAME);
        self.lock_word
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn exit(&self) {
        self.debug.check_usable(Self::NAME);
        let previous = self.lock_word.swap(UNLOCKED, Ordering::Release);
        debug_assert_ne!(
            previous, UNLOCKED,
            "futex: exit of a mutex that is not locked"
        );
        if previous == WAITERS {
            if let Err(err) = futex::wake_one(&self.lock_word) {
                debug_assert!(false, "futex: wake failed: {err}");
            }
        }
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

impl<P: MutexPolicy> std::fmt::Debug for FutexEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutexEngine")
            .field("state", &self.state())
            .field("freed", &self.debug.is_freed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latch::LatchLevel;
    use crate::policy::TrackPolicy;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn initialised<P: MutexPolicy>() -> FutexEngine<P> {
        let mut engine = FutexEngine::default();
        engine.init(LatchId::new("futex_test", LatchLevel::NO_ORDER), crate::call_site!());
        engine
    }

    #[test]
    fn blocked_waiter_marks_word_and_is_woken() {
        init_test("blocked_waiter_marks_word_and_is_woken");
        let engine = Arc::new(initialised::<TrackPolicy>());
        assert!(engine.try_lock());

        let waiter = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine.enter(1, 0, crate::call_site!());
                engine.exit();
            })
        };

        let mut state = engine.state();
        for _ in 0..1000 {
            if state == LockWord::Waiters {
                break;
            }
            thread::sleep(Duration::from_millis(1));
            state = engine.state();
        }
        crate::assert_with_log!(
            state == LockWord::Waiters,
            "waiter announced",
            LockWord::Waiters,
            state
        );

        engine.exit();
        waiter.join().expect("waiter panicked");

        let snapshot = engine.policy().snapshot();
        crate::assert_with_log!(snapshot.waits >= 1, "waits counted", ">= 1", snapshot.waits);
        let state = engine.state();
        crate::assert_with_log!(
            state == LockWord::Unlocked,
            "released",
            LockWord::Unlocked,
            state
        );
        crate::test_complete!("blocked_waiter_marks_word_and_is_woken");
    }

    #[test]
    fn uncontended_enter_reports_no_waits() {
        init_test("uncontended_enter_reports_no_waits");
        let engine = initialised::<TrackPolicy>();
        engine.enter(30, 6, crate::call_site!());
        engine.exit();
        let snapshot = engine.policy().snapshot();
        crate::assert_with_log!(snapshot.spins == 0, "spins", 0u64, snapshot.spins);
        crate::assert_with_log!(snapshot.waits == 0, "waits", 0u64, snapshot.waits);
        crate::test_complete!("uncontended_enter_reports_no_waits");
    }

    #[test]
    #[should_panic(expected = "destroy while locked")]
    fn destroy_while_locked_is_fatal() {
        let mut engine = initialised::<NoPolicy>();
        assert!(engine.try_lock());
        engine.destroy();
    }
}
