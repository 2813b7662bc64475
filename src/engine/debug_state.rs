//! Debug-build lifecycle tracking for lock engines.
//!
//! In debug builds [`DebugState`] records whether the engine is freed
//! (never initialised, or destroyed) and, for engines without an inspectable
//! lock word, whether it is locked. Every check is a `debug_assert!`: protocol
//! misuse is a caller bug, fatal in debug builds and unchecked otherwise.
//! In release builds the type is zero-sized and every method is empty.

#[cfg(debug_assertions)]
mod inner {
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Freed/locked flags (debug builds).
    #[derive(Debug)]
    pub struct DebugState {
        freed: AtomicBool,
        locked: AtomicBool,
    }

    impl DebugState {
        pub const fn new() -> Self {
            Self {
                freed: AtomicBool::new(true),
                locked: AtomicBool::new(false),
            }
        }

        pub fn on_init(&mut self, engine: &str) {
            debug_assert!(
                *self.freed.get_mut(),
                "{engine}: init of an already initialised mutex"
            );
            debug_assert!(!*self.locked.get_mut(), "{engine}: init while locked");
            *self.freed.get_mut() = false;
        }

        pub fn on_destroy(&mut self, engine: &str) {
            debug_assert!(!*self.locked.get_mut(), "{engine}: destroy while locked");
            debug_assert!(!*self.freed.get_mut(), "{engine}: double destroy");
            *self.freed.get_mut() = true;
        }

        #[inline]
        pub fn check_usable(&self, engine: &str) {
            debug_assert!(
                !self.freed.load(Ordering::Relaxed),
                "{engine}: used while freed (before init or after destroy)"
            );
        }

        #[inline]
        pub fn on_locked(&self, engine: &str) {
            let was_locked = self.locked.swap(true, Ordering::Relaxed);
            debug_assert!(!was_locked, "{engine}: acquired while already marked locked");
        }

        #[inline]
        pub fn on_unlock(&self, engine: &str) {
            let was_locked = self.locked.swap(false, Ordering::Relaxed);
            debug_assert!(was_locked, "{engine}: exit of a mutex that is not locked");
        }

        pub fn is_freed(&self) -> Option<bool> {
            Some(self.freed.load(Ordering::Relaxed))
        }
    }
}

#[cfg(not(debug_assertions))]
mod inner {
    /// Zero-sized stand-in (release builds).
    #[derive(Debug)]
    pub struct DebugState;

    impl DebugState {
        pub const fn new() -> Self {
            Self
        }

        #[inline(always)]
        pub fn on_init(&mut self, _engine: &str) {}

        #[inline(always)]
        pub fn on_destroy(&mut self, _engine: &str) {}

        #[inline(always)]
        pub fn check_usable(&self, _engine: &str) {}

        #[inline(always)]
        pub fn on_locked(&self, _engine: &str) {}

        #[inline(always)]
        pub fn on_unlock(&self, _engine: &str) {}

        pub fn is_freed(&self) -> Option<bool> {
            None
        }
    }
}

pub(crate) use inner::DebugState;

impl Default for DebugState {
    fn default() -> Self {
        Self::new()
    }
}
