//! Instrumented policy: accounting, ownership and latch order.

use super::{MutexPolicy, PolicySnapshot, order};
use crate::latch::{CallSite, LatchId};
use crate::util::thread;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

const NO_OWNER: u64 = 0;

/// Source of per-`init` instance keys for the held-latch list.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Counters are written by the holder only, but read from anywhere.
#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    spins: AtomicU64,
    waits: AtomicU64,
}

impl Counters {
    fn reset(&mut self) {
        *self.calls.get_mut() = 0;
        *self.spins.get_mut() = 0;
        *self.waits.get_mut() = 0;
    }
}

/// Policy that records who holds the mutex, where it was acquired, and how
/// much spinning and blocking acquisitions cost. Also validates the latch
/// order of the calling thread on every acquisition.
///
/// All checks are diagnostics: a violation panics, but a correct program
/// sees exactly the same locking behaviour as with [`NoPolicy`](super::NoPolicy).
#[derive(Debug, Default)]
pub struct TrackPolicy {
    id: LatchId,
    key: u64,
    created: Option<CallSite>,
    owner: AtomicU64,
    holder: Mutex<Option<CallSite>>,
    counters: Counters,
}

impl TrackPolicy {
    /// Identity given at `init`.
    #[must_use]
    pub fn latch_id(&self) -> LatchId {
        self.id
    }

    /// Where the current holder acquired the mutex.
    #[must_use]
    pub fn holder_site(&self) -> Option<CallSite> {
        *self.holder.lock()
    }

}

impl MutexPolicy for TrackPolicy {
    fn init(&mut self, id: LatchId, site: CallSite) {
        self.id = id;
        self.key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        self.created = Some(site);
        *self.owner.get_mut() = NO_OWNER;
        *self.holder.get_mut() = None;
        self.counters.reset();
    }

    fn destroy(&mut self) {
        let owner = *self.owner.get_mut();
        assert_eq!(
            owner,
            NO_OWNER,
            "latch {} destroyed while held (acquired at {:?})",
            self.id,
            self.holder.get_mut()
        );
        self.created = None;
    }

    fn enter(&self, site: CallSite) {
        order::check_enter(self.key, self.id, site);
    }

    fn locked(&self, site: CallSite) {
        let previous = self
            .owner
            .swap(thread::current().get(), Ordering::Relaxed);
        assert_eq!(
            previous, NO_OWNER,
            "latch {} acquired at {site} while owner {previous} still recorded",
            self.id
        );
        *self.holder.lock() = Some(site);
        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        order::push(self.key, self.id, site);
    }

    fn release(&self) {
        assert!(
            self.is_owned(),
            "latch {} released by a thread that does not hold it",
            self.id
        );
        order::remove(self.key);
        *self.holder.lock() = None;
        self.owner.store(NO_OWNER, Ordering::Relaxed);
    }

    fn add(&self, spins: u32, waits: u32) {
        self.counters
            .spins
            .fetch_add(u64::from(spins), Ordering::Relaxed);
        self.counters
            .waits
            .fetch_add(u64::from(waits), Ordering::Relaxed);
    }

    fn is_owned(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == thread::current().get()
    }

    fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            name: self.id.name,
            level: self.id.level,
            calls: self.counters.calls.load(Ordering::Relaxed),
            spins: self.counters.spins.load(Ordering::Relaxed),
            waits: self.counters.waits.load(Ordering::Relaxed),
            holder: self.holder_site(),
            created: self.created,
        }
    }
}
