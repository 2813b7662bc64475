//! Event hybrid engine.
//!
//! Spins with a plain read of the lock word before every test-and-set, then
//! parks in a [`WaitQueue`] on the mutex's own [`WakeEvent`]. The lock word
//! only ever holds `UNLOCKED` or `LOCKED`; pending sleepers are announced
//! through a separate waiters flag.
//!
//! Release stores `UNLOCKED` and then reads the waiters flag; a parking
//! thread stores the flag and then re-tries the lock word. Both sides issue
//! a full fence between their store and their load, so at least one of them
//! sees the other's write: either the releaser signals, or the parker's
//! retry acquires.
//!
//! The wait queue's hang scan remains as a backstop for wakes lost outside
//! this exchange (see [`SyncArray::wake_hanging_threads`]).
//!
//! The wake event is created in `init` and dropped in `destroy`, never in
//! `new`/`Drop`, so an engine may sit in a static without owning an event
//! before the process is ready for one.
//!
//! [`SyncArray::wake_hanging_threads`]: crate::wait_queue::SyncArray::wake_hanging_threads

use super::{DebugState, LOCKED, LockEngine, UNLOCKED, debug_check_aligned};
use crate::config::SpinConfig;
use crate::event::WakeEvent;
use crate::latch::{CallSite, LatchId, LockWord};
use crate::policy::{MutexPolicy, NoPolicy};
use crate::tracing_compat::debug;
use crate::util::{random_delay, yield_now};
use crate::wait_queue::{SyncArray, WaitObject, WaitQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Retries of `try_lock` a parking thread makes after announcing itself.
pub const DEFAULT_WAIT_RETRIES: u32 = 4;

/// Spin-then-park mutex with an explicit waiters flag.
pub struct EventEngine<P: MutexPolicy = NoPolicy> {
    lock_word: AtomicU32,
    waiters: AtomicU32,
    event: Option<WakeEvent>,
    queue: Arc<dyn WaitQueue>,
    id: LatchId,
    wait_retries: u32,
    debug: DebugState,
    policy: P,
}

impl<P: MutexPolicy> Default for EventEngine<P> {
    fn default() -> Self {
        let queue: Arc<SyncArray> = Arc::clone(SyncArray::global());
        Self::with_wait_queue(queue)
    }
}

impl<P: MutexPolicy> EventEngine<P> {
    /// Creates a freed engine that parks in the global [`SyncArray`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a freed engine that parks in `queue`.
    #[must_use]
    pub fn with_wait_queue(queue: Arc<dyn WaitQueue>) -> Self {
        Self {
            lock_word: AtomicU32::new(UNLOCKED),
            waiters: AtomicU32::new(0),
            event: None,
            queue,
            id: LatchId::UNKNOWN,
            wait_retries: DEFAULT_WAIT_RETRIES,
            debug: DebugState::new(),
            policy: P::default(),
        }
    }

    /// Sets how many times a parking thread retries the lock before it
    /// sleeps. Values below one are raised to one: the retry after the
    /// waiters flag is set is what pairs with the release-side check.
    pub fn set_wait_retries(&mut self, retries: u32) {
        self.wait_retries = retries.max(1);
    }

    /// Retries a parking thread makes before it sleeps.
    #[must_use]
    pub fn wait_retries(&self) -> u32 {
        self.wait_retries
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Same as [`LockEngine::try_lock`]; provided inherently because the
    /// engine also implements [`WaitObject`].
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.debug.check_usable(<Self as LockEngine>::NAME);
        self.tas_lock()
    }

    /// Returns true if some thread holds the lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_word.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Returns true if a thread may be parked on the mutex.
    #[must_use]
    pub fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::Relaxed) != 0
    }

    /// The wake event, present between `init` and `destroy`.
    #[must_use]
    pub fn event(&self) -> Option<&WakeEvent> {
        self.event.as_ref()
    }

    /// Debug builds: whether the engine is freed. `None` in release builds.
    #[must_use]
    pub fn is_freed(&self) -> Option<bool> {
        self.debug.is_freed()
    }

    #[inline]
    fn tas_lock(&self) -> bool {
        self.lock_word.swap(LOCKED, Ordering::Acquire) == UNLOCKED
    }

    #[inline]
    fn tas_unlock(&self) {
        self.lock_word.store(UNLOCKED, Ordering::Release);
    }

    fn set_waiters(&self) {
        self.waiters.store(1, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    fn clear_waiters(&self) {
        self.waiters.store(0, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    /// Wakes any thread parked on the event.
    fn signal(&self) {
        self.clear_waiters();
        if let Some(event) = &self.event {
            event.set();
        }
        self.queue.wake(self);
    }

    /// Spins until the lock word reads free or `n_spins` reaches
    /// `max_spins`. Returns true if the word was seen free.
    fn is_free(&self, max_spins: u32, max_delay: u32, n_spins: &mut u32) -> bool {
        loop {
            if !self.is_locked() {
                return true;
            }
            random_delay(max_delay);
            *n_spins = n_spins.saturating_add(1);
            if *n_spins >= max_spins {
                return false;
            }
        }
    }

    fn spin_and_try_lock(&self, max_spins: u32, max_delay: u32, site: CallSite) {
        let step = max_spins.max(1);
        let mut budget = step;
        let mut n_spins: u32 = 0;
        let mut n_waits: u32 = 0;

        fence(Ordering::Acquire);

        loop {
            if self.is_free(budget, max_delay, &mut n_spins) {
                if self.tas_lock() {
                    break;
                }
                continue;
            }
            budget = n_spins.saturating_add(step);

            n_waits = n_waits.saturating_add(1);
            yield_now();

            if self.queue.park(self, site, self.wait_retries) {
                n_spins = n_spins.saturating_add(self.wait_retries);
                break;
            }
        }

        self.policy.add(n_spins, n_waits);
    }
}

impl<P: MutexPolicy> LockEngine for EventEngine<P> {
    type Policy = P;

    const NAME: &'static str = "event";

    fn init(&mut self, id: LatchId, _site: CallSite) {
        debug_check_aligned(&self.lock_word, Self::NAME);
        assert!(
            self.event.is_none(),
            "event: init of {id} which is already initialised (wake event exists)"
        );
        assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "event: init of {id} while locked"
        );
        self.debug.on_init(Self::NAME);
        self.id = id;
        *self.waiters.get_mut() = 0;
        self.event = Some(WakeEvent::new(id.name));
        debug!(latch = %id, engine = Self::NAME, "wake event created");
    }

    fn destroy(&mut self) {
        debug_assert_eq!(
            *self.lock_word.get_mut(),
            UNLOCKED,
            "event: destroy while locked"
        );
        self.debug.on_destroy(Self::NAME);
        self.event = None;
        debug!(latch = %self.id, engine = Self::NAME, "wake event destroyed");
    }

    fn enter(&self, max_spins: u32, max_delay: u32, site: CallSite) {
        self.debug.check_usable(Self::NAME);
        if !self.tas_lock() {
            self.spin_and_try_lock(max_spins, max_delay, site);
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        EventEngine::try_lock(self)
    }

    fn exit(&self) {
        self.debug.check_usable(Self::NAME);
        debug_assert_ne!(
            self.lock_word.load(Ordering::Relaxed),
            UNLOCKED,
            "event: exit of a mutex that is not locked"
        );

        self.tas_unlock();
        fence(Ordering::SeqCst);

        if self.waiters.load(Ordering::Relaxed) != 0 {
            self.signal();
        }
    }

    fn state(&self) -> LockWord {
        if !self.is_locked() {
            LockWord::Unlocked
        } else if self.has_waiters() {
            LockWord::Waiters
        } else {
            LockWord::Locked
        }
    }

    fn is_locked(&self) -> bool {
        EventEngine::is_locked(self)
    }

    fn configure(&mut self, config: &SpinConfig) {
        self.set_wait_retries(config.wait_retries);
    }

    fn policy(&self) -> &P {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }
}

impl<P: MutexPolicy> WaitObject for EventEngine<P> {
    fn latch_id(&self) -> LatchId {
        self.id
    }

    fn wake_event(&self) -> Option<&WakeEvent> {
        self.event.as_ref()
    }

    fn is_locked(&self) -> bool {
        EventEngine::is_locked(self)
    }

    fn set_waiters(&self) {
        EventEngine::set_waiters(self);
    }

    fn try_lock(&self) -> bool {
        self.tas_lock()
    }
}

impl<P: MutexPolicy> std::fmt::Debug for EventEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEngine")
            .field("id", &self.id)
            .field("state", &LockEngine::state(self))
            .field("has_event", &self.event.is_some())
            .field("wait_retries", &self.wait_retries)
            .finish_non_exhaustive()
    }
}
