//! The policy composition layer.
//!
//! [`PolicyMutex`] is the surface the rest of a program locks through. It
//! owns one [`LockEngine`] (which embeds its [`MutexPolicy`]) and an
//! optional [`MutexObserver`], and only decides the order in which they are
//! told about each operation:
//!
//! | Operation | Sequence |
//! |---|---|
//! | `init` | observer `register`, engine `init`, policy `init` |
//! | `enter` | observer `begin_wait`, policy `enter`, engine `enter`, policy `locked`, observer `end_wait` |
//! | `try_lock` | observer `begin_wait`, engine `try_lock`, on success policy `enter` + `locked`, observer `end_wait` |
//! | `exit` | observer `released`, policy `release`, engine `exit` |
//! | `destroy` | observer `unregister`, engine `destroy`, policy `destroy` |
//!
//! The layer adds no failure modes of its own. Return values are exactly
//! the engine's.

use crate::config::SpinConfig;
#[cfg(target_os = "linux")]
use crate::engine::FutexEngine;
use crate::engine::{EventEngine, LockEngine, OsEngine, SpinEngine};
use crate::latch::{CallSite, LatchId, LockWord};
use crate::observer::{MutexObserver, ObserverKey, WaitOp, WaitToken};
use crate::policy::{DefaultPolicy, MutexPolicy, PolicySnapshot};
use std::fmt;
use std::sync::Arc;

/// A lock engine wrapped with its policy and optional observer.
pub struct PolicyMutex<E: LockEngine> {
    engine: E,
    observer: Option<Arc<dyn MutexObserver>>,
    key: Option<ObserverKey>,
}

impl<E: LockEngine> PolicyMutex<E> {
    /// Creates a freed mutex with no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_engine(E::default())
    }

    /// Wraps an already constructed (freed) engine.
    #[must_use]
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            observer: None,
            key: None,
        }
    }

    /// Attaches a monitoring observer. Must be done before `init`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MutexObserver>) -> Self {
        debug_assert!(self.key.is_none(), "observer attached after init");
        self.observer = Some(observer);
        self
    }

    /// Makes the mutex usable under identity `id`.
    pub fn init(&mut self, id: LatchId, site: CallSite) {
        if let Some(observer) = &self.observer {
            self.key = Some(observer.register(id, site));
        }
        self.engine.init(id, site);
        self.engine.policy_mut().init(id, site);
    }

    /// Tears the mutex down. It must not be held. The mutex may be
    /// initialised again afterwards.
    pub fn destroy(&mut self) {
        if let (Some(observer), Some(key)) = (&self.observer, self.key.take()) {
            observer.unregister(key);
        }
        self.engine.destroy();
        self.engine.policy_mut().destroy();
    }

    /// Acquires the mutex, blocking or spinning until it succeeds.
    pub fn enter(&self, max_spins: u32, max_delay: u32, site: CallSite) {
        let token = self.begin_wait(WaitOp::Lock, site);

        self.engine.policy().enter(site);
        self.engine.enter(max_spins, max_delay, site);
        self.engine.policy().locked(site);

        self.end_wait(token, true);
    }

    /// [`enter`](Self::enter) with the spin tuning from `config`.
    pub fn lock(&self, config: &SpinConfig, site: CallSite) {
        self.enter(config.max_spins, config.max_delay, site);
    }

    /// Acquires the mutex and returns a guard that calls
    /// [`exit`](Self::exit) when dropped.
    pub fn guard(&self, config: &SpinConfig, site: CallSite) -> PolicyMutexGuard<'_, E> {
        self.lock(config, site);
        PolicyMutexGuard { mutex: self }
    }

    /// Attempts to acquire the mutex without blocking.
    pub fn try_lock(&self, site: CallSite) -> bool {
        let token = self.begin_wait(WaitOp::TryLock, site);

        let acquired = self.engine.try_lock();
        if acquired {
            let policy = self.engine.policy();
            policy.enter(site);
            policy.locked(site);
        }

        self.end_wait(token, acquired);
        acquired
    }

    /// Releases the mutex. The caller must hold it.
    pub fn exit(&self) {
        if let (Some(observer), Some(key)) = (&self.observer, self.key) {
            observer.released(key);
        }
        self.engine.policy().release();
        self.engine.exit();
    }

    /// Applies spin tuning to the engine. The mutex must not be in use.
    ///
    /// Unlike [`SpinConfig::validate`] this accepts any values; the engine
    /// raises a zero retry count to one so a parked thread cannot miss a
    /// release.
    pub fn configure(&mut self, config: &SpinConfig) {
        self.engine.configure(config);
    }

    /// The embedded policy.
    #[must_use]
    pub fn policy(&self) -> &E::Policy {
        self.engine.policy()
    }

    /// Accounting snapshot of the policy.
    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        self.engine.policy().snapshot()
    }

    /// Returns true if the calling thread holds the mutex. Always false
    /// unless the policy tracks ownership.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.engine.policy().is_owned()
    }

    /// Returns true if some thread holds the mutex.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.engine.is_locked()
    }

    /// Current lock-word state.
    #[must_use]
    pub fn state(&self) -> LockWord {
        self.engine.state()
    }

    /// The wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    fn begin_wait(&self, op: WaitOp, site: CallSite) -> Option<WaitToken> {
        match (&self.observer, self.key) {
            (Some(observer), Some(key)) => Some(observer.begin_wait(key, op, site)),
            _ => None,
        }
    }

    #[inline]
    fn end_wait(&self, token: Option<WaitToken>, acquired: bool) {
        if let (Some(observer), Some(token)) = (&self.observer, token) {
            observer.end_wait(token, acquired);
        }
    }
}

impl<E: LockEngine> Default for PolicyMutex<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LockEngine> fmt::Debug for PolicyMutex<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyMutex")
            .field("engine", &E::NAME)
            .field("state", &self.state())
            .field("observed", &self.observer.is_some())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Holds a [`PolicyMutex`] until dropped.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct PolicyMutexGuard<'a, E: LockEngine> {
    mutex: &'a PolicyMutex<E>,
}

impl<E: LockEngine> Drop for PolicyMutexGuard<'_, E> {
    fn drop(&mut self) {
        self.mutex.exit();
    }
}

impl<E: LockEngine> fmt::Debug for PolicyMutexGuard<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyMutexGuard")
            .field("engine", &E::NAME)
            .finish()
    }
}

/// Platform mutex.
pub type OsMutex<P = DefaultPolicy> = PolicyMutex<OsEngine<P>>;

/// Test-and-test-and-set spin mutex.
pub type SpinMutex<P = DefaultPolicy> = PolicyMutex<SpinEngine<P>>;

/// Spin-then-futex mutex.
#[cfg(target_os = "linux")]
pub type FutexMutex<P = DefaultPolicy> = PolicyMutex<FutexEngine<P>>;

/// Spin-then-park mutex.
pub type EventMutex<P = DefaultPolicy> = PolicyMutex<EventEngine<P>>;

/// Mutex type selected by the `futex-mutex` / `sys-mutex` features.
#[cfg(all(feature = "futex-mutex", target_os = "linux"))]
pub type DefaultMutex = FutexMutex;

/// Mutex type selected by the `futex-mutex` / `sys-mutex` features.
#[cfg(all(
    feature = "sys-mutex",
    not(all(feature = "futex-mutex", target_os = "linux"))
))]
pub type DefaultMutex = OsMutex;

/// Mutex type selected by the `futex-mutex` / `sys-mutex` features.
#[cfg(not(any(all(feature = "futex-mutex", target_os = "linux"), feature = "sys-mutex")))]
pub type DefaultMutex = EventMutex;
