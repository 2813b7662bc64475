//! Lock engines: the raw mutual-exclusion strategies.
//!
//! Every engine implements [`LockEngine`] with the same contract:
//!
//! - `init` / `destroy` bracket all other operations and need exclusive
//!   access. `destroy` must not be called while the lock is held.
//! - `enter` blocks (or spins) until the lock is acquired; it cannot fail
//!   and cannot be cancelled. `max_spins` and `max_delay` are tuning, not a
//!   timeout.
//! - `try_lock` never blocks.
//! - `exit` may only be called by the holder.
//! - Acquisition is acquire-ordered and release is release-ordered with
//!   respect to the critical section.
//!
//! Engines own their [`MutexPolicy`] and report spin/wait counts to it via
//! [`MutexPolicy::add`] when `enter` completes.
//!
//! | Engine | Blocking strategy | Lock word |
//! |---|---|---|
//! | [`OsEngine`] | platform mutex, no spinning | internal |
//! | [`SpinEngine`] | spin + randomized delay + yield | `UNLOCKED`/`LOCKED` |
//! | [`FutexEngine`] | spin, then kernel wait on the word | `UNLOCKED`/`LOCKED`/`WAITERS` |
//! | [`EventEngine`] | spin, then park in a [`WaitQueue`](crate::wait_queue::WaitQueue) | `UNLOCKED`/`LOCKED` + waiters flag |

mod debug_state;
mod event;
#[cfg(target_os = "linux")]
mod futex;
mod os;
mod spin;

pub use event::{DEFAULT_WAIT_RETRIES, EventEngine};
#[cfg(target_os = "linux")]
pub use futex::FutexEngine;
pub use os::OsEngine;
pub use spin::SpinEngine;

pub(crate) use debug_state::DebugState;

use crate::config::SpinConfig;
use crate::latch::{CallSite, LatchId, LockWord};
use crate::policy::MutexPolicy;
use std::sync::atomic::AtomicU32;

pub(crate) const UNLOCKED: u32 = LockWord::Unlocked.raw();
pub(crate) const LOCKED: u32 = LockWord::Locked.raw();
pub(crate) const WAITERS: u32 = LockWord::Waiters.raw();

/// A low-level mutex implementation.
pub trait LockEngine: Default + Send + Sync + 'static {
    /// Policy embedded in the engine.
    type Policy: MutexPolicy;

    /// Short engine name used in diagnostics.
    const NAME: &'static str;

    /// Makes the engine usable. Called once per lifecycle, never while
    /// other threads can reach the engine.
    fn init(&mut self, id: LatchId, site: CallSite);

    /// Tears the engine down. The lock must not be held.
    fn destroy(&mut self);

    /// Acquires the lock, spinning up to `max_spins` rounds with random
    /// delays of at most `max_delay` units before the engine's fallback.
    fn enter(&self, max_spins: u32, max_delay: u32, site: CallSite);

    /// Attempts to acquire the lock without blocking.
    fn try_lock(&self) -> bool;

    /// Releases the lock. The caller must hold it.
    fn exit(&self);

    /// Current lock-word state.
    fn state(&self) -> LockWord;

    /// Returns true if some thread holds the lock.
    fn is_locked(&self) -> bool {
        self.state().is_locked()
    }

    /// Applies engine-specific tuning. Called only between lifecycles or
    /// before first use.
    ///
    /// `config` is not validated; engines raise out-of-range values to the
    /// nearest safe setting instead.
    fn configure(&mut self, _config: &SpinConfig) {}

    /// Embedded policy.
    fn policy(&self) -> &Self::Policy;

    /// Embedded policy, mutably.
    fn policy_mut(&mut self) -> &mut Self::Policy;
}

/// Checks the lock word sits on its natural alignment.
#[inline]
pub(crate) fn debug_check_aligned(word: &AtomicU32, engine: &str) {
    debug_assert!(
        word.as_ptr().is_aligned(),
        "{engine}: lock word at {:p} is misaligned",
        word.as_ptr()
    );
}
