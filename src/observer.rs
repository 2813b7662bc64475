//! Optional monitoring hooks.
//!
//! A [`MutexObserver`] is injected into a [`PolicyMutex`](crate::PolicyMutex)
//! at construction. It hears about registration, each wait (blocking
//! `enter` or `try_lock`) and each release, but cannot influence any of
//! them. Mutexes built without an observer skip the hooks entirely.

use crate::latch::{CallSite, LatchId, LatchLevel};
use crate::tracing_compat::{debug, trace};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Kind of acquisition being observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WaitOp {
    /// Blocking `enter`.
    Lock,
    /// Non-blocking `try_lock`.
    TryLock,
}

/// Handle an observer hands out for a registered mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObserverKey(pub u64);

/// An acquisition in progress, from `begin_wait` to `end_wait`.
#[derive(Debug, Clone, Copy)]
pub struct WaitToken {
    /// Mutex being acquired.
    pub key: ObserverKey,
    /// Kind of acquisition.
    pub op: WaitOp,
    /// Where the caller asked for the lock.
    pub site: CallSite,
    /// When the acquisition started.
    pub started: Instant,
}

impl WaitToken {
    /// Starts timing an acquisition now.
    #[must_use]
    pub fn start(key: ObserverKey, op: WaitOp, site: CallSite) -> Self {
        Self {
            key,
            op,
            site,
            started: Instant::now(),
        }
    }
}

/// Monitoring hooks around a mutex.
pub trait MutexObserver: Send + Sync {
    /// A mutex was initialised.
    fn register(&self, id: LatchId, site: CallSite) -> ObserverKey;

    /// A mutex was destroyed.
    fn unregister(&self, key: ObserverKey);

    /// An acquisition is starting.
    fn begin_wait(&self, key: ObserverKey, op: WaitOp, site: CallSite) -> WaitToken {
        WaitToken::start(key, op, site)
    }

    /// An acquisition finished. `acquired` is false only for a failed
    /// `try_lock`.
    fn end_wait(&self, token: WaitToken, acquired: bool);

    /// The holder is about to release the mutex.
    fn released(&self, key: ObserverKey);
}

/// Wait statistics of one registered mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatchWaitStats {
    /// Latch name.
    pub name: &'static str,
    /// Latch level.
    pub level: LatchLevel,
    /// Completed blocking acquisitions.
    pub lock_waits: u64,
    /// `try_lock` calls.
    pub try_locks: u64,
    /// `try_lock` calls that failed.
    pub try_failures: u64,
    /// Releases.
    pub releases: u64,
    /// Total time spent in blocking acquisitions.
    pub wait_time: Duration,
    /// Longest single blocking acquisition.
    pub max_wait: Duration,
}

impl LatchWaitStats {
    fn new(id: LatchId) -> Self {
        Self {
            name: id.name,
            level: id.level,
            lock_waits: 0,
            try_locks: 0,
            try_failures: 0,
            releases: 0,
            wait_time: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }
}

/// Observer that aggregates wait statistics per registered mutex.
#[derive(Debug, Default)]
pub struct WaitStatsObserver {
    next_key: AtomicU64,
    latches: Mutex<HashMap<ObserverKey, LatchWaitStats>>,
}

impl WaitStatsObserver {
    /// Creates an observer with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of one mutex, if still registered.
    #[must_use]
    pub fn stats(&self, key: ObserverKey) -> Option<LatchWaitStats> {
        self.latches.lock().get(&key).copied()
    }

    /// Number of registered mutexes.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.latches.lock().len()
    }

    /// Statistics of every registered mutex.
    #[must_use]
    pub fn all(&self) -> Vec<LatchWaitStats> {
        self.latches.lock().values().copied().collect()
    }
}

impl MutexObserver for WaitStatsObserver {
    fn register(&self, id: LatchId, site: CallSite) -> ObserverKey {
        let key = ObserverKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        self.latches.lock().insert(key, LatchWaitStats::new(id));
        debug!(latch = %id, %site, key = key.0, "latch registered");
        key
    }

    fn unregister(&self, key: ObserverKey) {
        if let Some(stats) = self.latches.lock().remove(&key) {
            debug!(
                latch = stats.name,
                key = key.0,
                lock_waits = stats.lock_waits,
                releases = stats.releases,
                "latch unregistered"
            );
        }
    }

    fn end_wait(&self, token: WaitToken, acquired: bool) {
        let waited = token.started.elapsed();
        let mut latches = self.latches.lock();
        let Some(stats) = latches.get_mut(&token.key) else {
            return;
        };
        match token.op {
            WaitOp::Lock => {
                stats.lock_waits += 1;
                stats.wait_time += waited;
                stats.max_wait = stats.max_wait.max(waited);
            }
            WaitOp::TryLock => {
                stats.try_locks += 1;
                if !acquired {
                    stats.try_failures += 1;
                }
            }
        }
        trace!(key = token.key.0, op = ?token.op, acquired, ?waited, "wait ended");
    }

    fn released(&self, key: ObserverKey) {
        if let Some(stats) = self.latches.lock().get_mut(&key) {
            stats.releases += 1;
        }
    }
}
