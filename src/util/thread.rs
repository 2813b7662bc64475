//! Small numeric thread identities for owner tracking.
//!
//! `std::thread::ThreadId` cannot be stored in an atomic, so each thread is
//! given a process-unique non-zero number the first time it asks.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_NUMBER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: NonZeroU64 = {
        let raw = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN)
    };
}

/// Returns the calling thread's number. Never zero.
#[inline]
#[must_use]
pub fn current() -> NonZeroU64 {
    THREAD_NUMBER.with(|n| *n)
}
