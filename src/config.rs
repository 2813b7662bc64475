//! Tuning for spin phases and the sync-array hang scan.
//!
//! This module provides:
//! - [`SpinConfig`]: the `max_spins` / `max_delay` pair passed to `enter`,
//!   plus the retry budget used while parking
//! - [`MonitorConfig`]: how often parked threads are re-checked for missed
//!   wakeups
//! - [`LatchConfig`]: both, with layered loading (defaults + env)
//!
//! All values are tuning knobs, not timeouts: `enter` never gives up.

use crate::error::ConfigError;
use crate::tracing_compat::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env override for [`SpinConfig::max_spins`].
pub const ENV_SPIN_ROUNDS: &str = "POLICY_MUTEX_SPIN_ROUNDS";
/// Env override for [`SpinConfig::max_delay`].
pub const ENV_SPIN_DELAY: &str = "POLICY_MUTEX_SPIN_DELAY";
/// Env override for [`SpinConfig::wait_retries`].
pub const ENV_WAIT_RETRIES: &str = "POLICY_MUTEX_WAIT_RETRIES";
/// Env override for [`MonitorConfig::scan_interval`], in milliseconds.
pub const ENV_SCAN_INTERVAL_MS: &str = "POLICY_MUTEX_SCAN_INTERVAL_MS";

/// Spin tuning passed to every `enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinConfig {
    /// Failed attempts before yielding (spin engine) or blocking
    /// (futex/event engines).
    pub max_spins: u32,
    /// Upper bound of the random busy-wait between attempts, in delay units.
    pub max_delay: u32,
    /// Extra `try_lock` attempts the event engine makes after announcing
    /// itself as a waiter and before it sleeps.
    pub wait_retries: u32,
}

impl SpinConfig {
    /// Largest accepted `max_delay`.
    pub const MAX_DELAY: u32 = 1000;

    /// Validates the values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_spins == 0 {
            return Err(ConfigError::ZeroSpinRounds);
        }
        if self.max_delay > Self::MAX_DELAY {
            return Err(ConfigError::SpinDelayTooLarge {
                value: self.max_delay,
                max: Self::MAX_DELAY,
            });
        }
        if self.wait_retries == 0 {
            return Err(ConfigError::ZeroWaitRetries);
        }
        Ok(())
    }
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            max_spins: 30,
            max_delay: 6,
            wait_retries: 4,
        }
    }
}

/// Hang-scan tuning for [`SyncArray`](crate::wait_queue::SyncArray).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the monitor wakes parked threads whose mutex is free.
    pub scan_interval: Duration,
}

impl MonitorConfig {
    /// Validates the values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_interval.is_zero() {
            return Err(ConfigError::ZeroScanInterval);
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(1),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatchConfig {
    /// Spin tuning.
    pub spin: SpinConfig,
    /// Hang-scan tuning.
    pub monitor: MonitorConfig,
}

impl LatchConfig {
    /// Loads defaults overridden by the `POLICY_MUTEX_*` environment
    /// variables, then validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads overrides from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_override(&lookup, ENV_SPIN_ROUNDS)? {
            config.spin.max_spins = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_SPIN_DELAY)? {
            config.spin.max_delay = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_WAIT_RETRIES)? {
            config.spin.wait_retries = v;
        }
        if let Some(ms) = parse_override(&lookup, ENV_SCAN_INTERVAL_MS)? {
            config.monitor.scan_interval = Duration::from_millis(u64::from(ms));
        }
        config.validate()?;
        debug!(
            max_spins = config.spin.max_spins,
            max_delay = config.spin.max_delay,
            wait_retries = config.spin.wait_retries,
            scan_interval_ms = config.monitor.scan_interval.as_millis() as u64,
            "latch config loaded"
        );
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spin.validate()?;
        self.monitor.validate()
    }
}

fn parse_override<F>(lookup: &F, var: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
}
