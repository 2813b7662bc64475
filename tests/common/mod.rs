//! Shared helpers for integration tests.

#![allow(dead_code, unused_macros)]

use policy_mutex::{LatchId, LatchLevel, LockEngine, PolicyMutex};
use std::sync::Once;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

static INIT: Once = Once::new();

/// Installs a fmt subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("policy_mutex=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}

macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(phase = %$name, "test phase start");
    };
}

macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "test complete");
    };
}

macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr) => {{
        let passed = $cond;
        ::tracing::debug!(
            check = %$what,
            expected = ?$expected,
            actual = ?$actual,
            passed,
            "assertion"
        );
        assert!(passed, "{}: expected {:?}, got {:?}", $what, $expected, $actual);
    }};
}

pub(crate) use {assert_with_log, test_complete, test_phase};

/// Identity used by tests that do not care about ordering.
pub const UNORDERED: LatchId = LatchId::new("test_latch", LatchLevel::NO_ORDER);

/// Builds and initialises a mutex over engine `E`.
pub fn initialised<E: LockEngine>(id: LatchId) -> PolicyMutex<E> {
    let mut mutex = PolicyMutex::new();
    mutex.init(id, policy_mutex::call_site!());
    mutex
}

/// Runs `f` on its own thread and fails the test if it does not finish
/// within `limit`. A hang is reported instead of blocking the test run.
pub fn with_watchdog<T, F>(name: &str, limit: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name(format!("{name}-worker"))
        .spawn(move || {
            let value = f();
            let _ = tx.send(());
            value
        })
        .expect("spawn watchdog worker");

    match rx.recv_timeout(limit) {
        Ok(()) => worker.join().expect("worker panicked"),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // The worker panicked before sending; surface its panic.
            match worker.join() {
                Ok(value) => value,
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("{name}: no progress within {limit:?}, a waiter is stuck")
        }
    }
}
