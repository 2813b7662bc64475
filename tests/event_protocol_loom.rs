//! Loom models of the event engine's release/park handshake.
//!
//! The engine fences a plain store against a later load on each side. Loom
//! treats `SeqCst` as `AcqRel`, so the models express each store + fence as
//! an `AcqRel` read-modify-write, which gives loom the same "one side sees
//! the other" guarantee to check.
//!
//! Run with: cargo test --test event_protocol_loom --features loom-tests --release

#![cfg(feature = "loom-tests")]

use loom::sync::atomic::{AtomicU32, Ordering};
use loom::sync::{Arc, Condvar, Mutex};
use loom::thread;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

// ============================================================================
// Wake event model: manual reset with a signal counter
// ============================================================================

struct LoomEvent {
    state: Mutex<(bool, u64)>,
    cond: Condvar,
}

impl LoomEvent {
    fn new() -> Self {
        Self {
            state: Mutex::new((false, 1)),
            cond: Condvar::new(),
        }
    }

    fn reset(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.0 = false;
        state.1
    }

    fn set(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.0 {
            state.0 = true;
            state.1 += 1;
            self.cond.notify_all();
        }
    }

    fn wait_low(&self, count: u64) {
        let mut state = self.state.lock().unwrap();
        while !state.0 && state.1 == count {
            state = self.cond.wait(state).unwrap();
        }
    }
}

struct LoomEventMutex {
    lock_word: AtomicU32,
    waiters: AtomicU32,
    event: LoomEvent,
}

impl LoomEventMutex {
    fn new_locked() -> Self {
        Self {
            lock_word: AtomicU32::new(LOCKED),
            waiters: AtomicU32::new(0),
            event: LoomEvent::new(),
        }
    }

    fn try_lock(&self) -> bool {
        self.lock_word.swap(LOCKED, Ordering::AcqRel) == UNLOCKED
    }

    fn exit(&self) {
        self.lock_word.swap(UNLOCKED, Ordering::AcqRel);
        if self.waiters.load(Ordering::Acquire) != 0 {
            self.waiters.swap(0, Ordering::AcqRel);
            self.event.set();
        }
    }

    /// One park attempt with `retries` retries. True if acquired.
    fn park(&self, retries: u32) -> bool {
        let count = self.event.reset();
        self.waiters.swap(1, Ordering::AcqRel);
        for _ in 0..retries {
            if self.try_lock() {
                return true;
            }
        }
        self.event.wait_low(count);
        false
    }

    fn enter(&self) {
        loop {
            if self.try_lock() {
                return;
            }
            if self.park(1) {
                return;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

/// Releaser and waiter race on the waiters flag: either the release sees
/// the flag and signals, or the waiter's retry sees the lock free.
#[test]
fn loom_release_sees_waiter_or_waiter_sees_release() {
    loom::model(|| {
        let mutex = Arc::new(LoomEventMutex::new_locked());

        let waiter = {
            let mutex = mutex.clone();
            thread::spawn(move || {
                mutex.enter();
                mutex.exit();
            })
        };

        mutex.exit();
        waiter.join().unwrap();

        assert_eq!(mutex.lock_word.load(Ordering::Acquire), UNLOCKED);
    });
}

/// Two waiters behind one holder must both get through.
#[test]
fn loom_two_waiters_both_acquire() {
    let mut builder = loom::model::Builder::new();
    builder.preemption_bound = Some(3);
    builder.check(|| {
        let mutex = Arc::new(LoomEventMutex::new_locked());
        let acquired = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let mutex = mutex.clone();
                let acquired = acquired.clone();
                thread::spawn(move || {
                    mutex.enter();
                    acquired.fetch_add(1, Ordering::Relaxed);
                    mutex.exit();
                })
            })
            .collect();

        mutex.exit();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(acquired.load(Ordering::Relaxed), 2);
    });
}
