//! Error types.
//!
//! The locking operations themselves are infallible: `enter` blocks until
//! it succeeds and `try_lock` reports a plain `bool`. Misuse of the locking
//! protocol (enter after destroy, exit without holding, destroy while
//! locked) is a caller bug and panics. The only recoverable errors come from
//! building a [`LatchConfig`](crate::config::LatchConfig).

use thiserror::Error;

/// Configuration validation and loading errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_spins` must be at least one.
    #[error("spin rounds must be non-zero")]
    ZeroSpinRounds,
    /// `max_delay` exceeds the supported bound.
    #[error("spin delay {value} exceeds maximum {max}")]
    SpinDelayTooLarge {
        /// Requested delay.
        value: u32,
        /// Largest accepted delay.
        max: u32,
    },
    /// `wait_retries` must be at least one.
    #[error("wait retries must be non-zero")]
    ZeroWaitRetries,
    /// The hang-scan interval must be non-zero.
    #[error("monitor scan interval must be non-zero")]
    ZeroScanInterval,
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Environment variable name.
        var: &'static str,
        /// Raw value found.
        value: String,
    },
}
