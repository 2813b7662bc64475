//! Logging shim over `tracing`.
//!
//! With the `tracing-integration` feature the macros below are the real
//! `tracing` macros. Without it they expand to nothing and their arguments
//! are not evaluated, so call sites never need their own `cfg` gates.

#![allow(unused_imports, unused_macros)]

#[cfg(feature = "tracing-integration")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
macro_rules! noop_log {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing-integration"))]
pub(crate) use {
    noop_log as debug, noop_log as error, noop_log as info, noop_log as trace, noop_log as warn,
};
