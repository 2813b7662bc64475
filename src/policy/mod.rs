//! Diagnostic policies plugged into every lock engine.
//!
//! A policy is told about each acquisition and release but never changes
//! its outcome. Two variants exist:
//!
//! - [`NoPolicy`]: every hook is an empty inline function.
//! - [`TrackPolicy`]: spin/wait accounting, holder identity and call site,
//!   and latch-order validation. Violations are fatal.
//!
//! [`DefaultPolicy`] is `TrackPolicy` in debug builds or with the
//! `latch-debug` feature, and `NoPolicy` otherwise.

mod order;
mod track;

pub use order::{held_latches, HeldLatch};
pub use track::TrackPolicy;

use crate::latch::{CallSite, LatchId, LatchLevel};
use serde::Serialize;

/// Hooks invoked by [`PolicyMutex`](crate::mutex::PolicyMutex) and the
/// engines around each operation.
///
/// Sequencing:
/// - `enter`: before the engine starts acquiring.
/// - `add`: by the engine once acquired, with the spins and waits it used.
/// - `locked`: after the engine acquired the lock.
/// - `release`: before the engine releases, while the lock is still held.
pub trait MutexPolicy: Default + Send + Sync + 'static {
    /// Called when the owning mutex is initialised. Resets accounting.
    fn init(&mut self, id: LatchId, site: CallSite);

    /// Called when the owning mutex is destroyed.
    fn destroy(&mut self);

    /// The calling thread is about to acquire the mutex.
    fn enter(&self, site: CallSite);

    /// The calling thread now holds the mutex.
    fn locked(&self, site: CallSite);

    /// The calling thread is about to release the mutex.
    fn release(&self);

    /// Accounts spins and waits used by one acquisition.
    fn add(&self, spins: u32, waits: u32);

    /// Returns true if the calling thread holds the mutex. Policies that
    /// do not track ownership always return false.
    fn is_owned(&self) -> bool;

    /// Accounting snapshot.
    fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot::default()
    }
}

/// Zero-cost policy: no accounting, no checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPolicy;

impl MutexPolicy for NoPolicy {
    #[inline(always)]
    fn init(&mut self, _id: LatchId, _site: CallSite) {}

    #[inline(always)]
    fn destroy(&mut self) {}

    #[inline(always)]
    fn enter(&self, _site: CallSite) {}

    #[inline(always)]
    fn locked(&self, _site: CallSite) {}

    #[inline(always)]
    fn release(&self) {}

    #[inline(always)]
    fn add(&self, _spins: u32, _waits: u32) {}

    #[inline(always)]
    fn is_owned(&self) -> bool {
        false
    }
}

/// Accounting state of a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    /// Latch name given at `init`.
    pub name: &'static str,
    /// Latch level given at `init`.
    pub level: LatchLevel,
    /// Successful acquisitions (`enter` and `try_lock`).
    pub calls: u64,
    /// Cumulative failed spin rounds across acquisitions.
    pub spins: u64,
    /// Cumulative block/park rounds across acquisitions.
    pub waits: u64,
    /// Where the current holder acquired the lock, if held.
    pub holder: Option<CallSite>,
    /// Where the mutex was initialised.
    pub created: Option<CallSite>,
}

/// Policy used by the crate's mutex aliases.
#[cfg(any(debug_assertions, feature = "latch-debug"))]
pub type DefaultPolicy = TrackPolicy;

/// Policy used by the crate's mutex aliases.
#[cfg(not(any(debug_assertions, feature = "latch-debug")))]
pub type DefaultPolicy = NoPolicy;
