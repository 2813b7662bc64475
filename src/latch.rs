//! Latch identity, call sites and lock-word states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering level of a latch class.
///
/// A thread that already holds ordered latches may only acquire a latch whose
/// level is strictly lower than every ordered level it holds. Latches at
/// [`LatchLevel::NO_ORDER`] are exempt from the rule.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LatchLevel(pub u32);

impl LatchLevel {
    /// Level for latches that take no part in order checking.
    pub const NO_ORDER: Self = Self(0);

    /// Returns true if this level participates in order checking.
    #[inline]
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        self.0 != Self::NO_ORDER.0
    }
}

impl fmt::Display for LatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ordered() {
            write!(f, "L{}", self.0)
        } else {
            f.write_str("unordered")
        }
    }
}

/// Identity tag of a mutex, assigned at `init`.
///
/// Names the mutex for monitoring and for its wake handle, and carries the
/// ordering level checked by the tracking policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LatchId {
    /// Human-readable latch class name (e.g. `"buf_pool"`).
    pub name: &'static str,
    /// Ordering level of the class.
    pub level: LatchLevel,
}

impl LatchId {
    /// Identity used by mutexes that were never initialised.
    pub const UNKNOWN: Self = Self::new("unknown", LatchLevel::NO_ORDER);

    /// Creates a latch identity.
    #[must_use]
    pub const fn new(name: &'static str, level: LatchLevel) -> Self {
        Self { name, level }
    }
}

impl Default for LatchId {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for LatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.level)
    }
}

/// Source location of a latch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    /// Source file.
    pub file: &'static str,
    /// Line within `file`.
    pub line: u32,
}

impl CallSite {
    /// Placeholder used before any holder has been recorded.
    pub const UNKNOWN: Self = Self::new("<unknown>", 0);

    /// Creates a call site.
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }
}

impl Default for CallSite {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Expands to the [`CallSite`] of the invocation.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::latch::CallSite::new(file!(), line!())
    };
}

/// Observable state of a lock word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LockWord {
    /// No thread holds the mutex.
    Unlocked = 0,
    /// Held, and no thread is known to be parked.
    Locked = 1,
    /// Held, and at least one thread may be parked on it.
    Waiters = 2,
}

impl LockWord {
    /// Raw value stored in the atomic cell.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Decodes a raw lock-word value. Anything non-zero that is not
    /// `WAITERS` reads as `Locked`.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Unlocked,
            2 => Self::Waiters,
            _ => Self::Locked,
        }
    }

    /// Returns true unless the word is `Unlocked`.
    #[inline]
    #[must_use]
    pub const fn is_locked(self) -> bool {
        !matches!(self, Self::Unlocked)
    }
}
