//! Per-mutex wake handle.
//!
//! A [`WakeEvent`] is a manual-reset event with a signal counter, the
//! wait primitive the event engine parks on. The counter closes the race
//! between "decided to sleep" and "actually sleeping": a waiter records the
//! counter when it resets the event, and [`WakeEvent::wait_low`] returns
//! immediately if any `set` happened after that point.
//!
//! Protocol, as used by the sync array:
//!
//! ```text
//! waiter                               releaser
//! ------                               --------
//! count = event.reset()
//! announce (waiters flag = 1)
//! retry try_lock a few times
//!                                      unlock; if waiters { clear; set() }
//! event.wait_low(count)  -> returns because counter moved
//! ```

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct EventState {
    is_set: bool,
    signal_count: u64,
}

/// Manual-reset event with a signal counter.
#[derive(Debug)]
pub struct WakeEvent {
    name: &'static str,
    state: Mutex<EventState>,
    cond: Condvar,
}

impl WakeEvent {
    /// Creates an event in the reset state.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(EventState {
                is_set: false,
                signal_count: 1,
            }),
            cond: Condvar::new(),
        }
    }

    /// Name given at creation (the latch name).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if the event is currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.lock().is_set
    }

    /// Current signal count.
    #[must_use]
    pub fn signal_count(&self) -> u64 {
        self.state.lock().signal_count
    }

    /// Sets the event and wakes every waiter. Setting an already set event
    /// is a no-op.
    pub fn set(&self) {
        let mut state = self.state.lock();
        if !state.is_set {
            state.is_set = true;
            state.signal_count += 1;
            drop(state);
            self.cond.notify_all();
        }
    }

    /// Resets the event and returns the signal count to pass to
    /// [`wait_low`](Self::wait_low).
    pub fn reset(&self) -> u64 {
        let mut state = self.state.lock();
        state.is_set = false;
        state.signal_count
    }

    /// Blocks until the event is set or the signal count differs from
    /// `reset_count`. A `reset_count` of zero waits on the current count.
    pub fn wait_low(&self, reset_count: u64) {
        let mut state = self.state.lock();
        let count = if reset_count == 0 {
            state.signal_count
        } else {
            reset_count
        };
        while !state.is_set && state.signal_count == count {
            self.cond.wait(&mut state);
        }
    }

    /// Like [`wait_low`](Self::wait_low) but gives up after `timeout`.
    /// Returns false on timeout.
    pub fn wait_time_low(&self, timeout: Duration, reset_count: u64) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let count = if reset_count == 0 {
            state.signal_count
        } else {
            reset_count
        };
        while !state.is_set && state.signal_count == count {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.is_set || state.signal_count != count;
            }
        }
        true
    }
}
