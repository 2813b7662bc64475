//! Per-thread pseudo-random numbers for spin back-off.
//!
//! Uses xorshift64: cheap, no shared state, and good enough to decorrelate
//! the back-off of threads contending on one lock word. It is NOT
//! cryptographically secure.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Xorshift64 generator.
#[derive(Debug, Clone)]
pub struct BackoffRng {
    state: u64,
}

impl BackoffRng {
    /// Creates a generator. A zero seed is replaced with 1.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Generates the next value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Returns a value in `[low, high]`. Returns `low` when `high <= low`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn interval(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        let span = u64::from(high - low) + 1;
        low + (self.next_u64() % span) as u32
    }
}

static SEED_SEQUENCE: AtomicU64 = AtomicU64::new(0x9E37_79B9_7F4A_7C15);

thread_local! {
    static THREAD_STATE: Cell<u64> = Cell::new(
        SEED_SEQUENCE
            .fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed)
            .rotate_left(17)
            | 1,
    );
}

/// Returns a pseudo-random value in `[low, high]` from the calling
/// thread's generator.
pub fn random_interval(low: u32, high: u32) -> u32 {
    THREAD_STATE.with(|state| {
        let mut rng = BackoffRng::new(state.get());
        let value = rng.interval(low, high);
        state.set(rng.state);
        value
    })
}
