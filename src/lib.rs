//! Policy-based mutexes for storage-engine internals.
//!
//! This crate provides four interchangeable low-level mutex implementations
//! ("lock engines") and a generic composition layer, [`PolicyMutex`], that
//! adds ordering/diagnostic policy and optional monitoring hooks around any
//! of them without changing the locking outcome.
//!
//! # Engines
//!
//! - [`OsEngine`]: thin wrapper over a platform blocking mutex, with
//!   debug-only freed/locked tracking.
//! - [`SpinEngine`]: test-and-test-and-set spinning with randomized back-off
//!   and adaptive yield. Never blocks the OS thread.
//! - [`FutexEngine`] (Linux): spins briefly, then blocks in the kernel on
//!   the lock word itself.
//! - [`EventEngine`]: spins, then parks in a [`WaitQueue`] on a per-mutex
//!   [`WakeEvent`] guarded by an explicit waiters flag.
//!
//! # Lifecycle
//!
//! Every mutex starts out freed. [`PolicyMutex::init`] makes it usable,
//! [`PolicyMutex::destroy`] tears it down again, and the pair may be repeated.
//! Wake handles are only created in `init` so that mutexes can live in
//! statics whose destructors run after the process has stopped providing
//! such services.
//!
//! # Example
//!
//! ```
//! use policy_mutex::{call_site, LatchId, LatchLevel, PolicyMutex, SpinMutex};
//!
//! let mut mutex: SpinMutex = PolicyMutex::new();
//! mutex.init(LatchId::new("buf_pool", LatchLevel::NO_ORDER), call_site!());
//!
//! mutex.enter(30, 6, call_site!());
//! assert!(!mutex.try_lock(call_site!()));
//! mutex.exit();
//!
//! mutex.destroy();
//! ```

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod latch;
pub mod mutex;
pub mod observer;
pub mod policy;
#[cfg(target_os = "linux")]
pub mod sys;
#[cfg(test)]
pub(crate) mod test_utils;
pub(crate) mod tracing_compat;
pub mod util;
pub mod wait_queue;

pub use config::{LatchConfig, MonitorConfig, SpinConfig};
#[cfg(target_os = "linux")]
pub use engine::FutexEngine;
pub use engine::{EventEngine, LockEngine, OsEngine, SpinEngine};
pub use error::ConfigError;
pub use event::WakeEvent;
pub use latch::{CallSite, LatchId, LatchLevel, LockWord};
#[cfg(target_os = "linux")]
pub use mutex::FutexMutex;
pub use mutex::{DefaultMutex, EventMutex, OsMutex, PolicyMutex, PolicyMutexGuard, SpinMutex};
pub use observer::{LatchWaitStats, MutexObserver, ObserverKey, WaitOp, WaitStatsObserver, WaitToken};
pub use policy::{DefaultPolicy, MutexPolicy, NoPolicy, PolicySnapshot, TrackPolicy};
pub use wait_queue::{MonitorHandle, SyncArray, SyncArrayStats, WaitObject, WaitQueue};
