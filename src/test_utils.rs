//! Test helpers: logging setup and phase narration macros.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a fmt subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `debug` for this crate.
pub(crate) fn init_test_logging() {
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

/// Marks the start of a test phase.
#[macro_export]
#[doc(hidden)]
macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(phase = %$name, "test phase start");
    };
}

/// Marks successful completion of a test.
#[macro_export]
#[doc(hidden)]
macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "test complete");
    };
}

/// Asserts a condition, logging expected and actual values first.
#[macro_export]
#[doc(hidden)]
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
        assert!(
            passed,
            "{}: expected {:?}, got {:?}",
            $what, $expected, $actual
        );
    }};
}
