//! Busy-wait delay and yield helpers used by the spin phases.

use super::rng::random_interval;

/// CPU pause instructions issued per unit of delay.
pub const PAUSE_MULTIPLIER: u32 = 50;

/// Busy-waits for `units * PAUSE_MULTIPLIER` pause instructions.
#[inline]
pub fn delay(units: u32) {
    for _ in 0..units.saturating_mul(PAUSE_MULTIPLIER) {
        std::hint::spin_loop();
    }
}

/// Busy-waits a random number of units in `[0, max_delay]`.
#[inline]
pub fn random_delay(max_delay: u32) {
    if max_delay != 0 {
        delay(random_interval(0, max_delay));
    }
}

/// Gives up the processor to the scheduler.
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}
