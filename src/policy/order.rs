//! Per-thread latch-order validation.
//!
//! Each thread keeps the set of latches it holds through a tracking policy.
//! Acquiring a latch is rejected when:
//! - the thread already holds that same mutex (self-deadlock), or
//! - the new latch is ordered and some ordered latch already held has a
//!   level less than or equal to it.
//!
//! Rejection is fatal: the violation is logged and the thread panics before
//! the engine is touched.

use crate::latch::{CallSite, LatchId};
use crate::tracing_compat::error;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt::Write as _;

/// A latch currently held by the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldLatch {
    /// Identity of the latch.
    pub id: LatchId,
    /// Where it was acquired.
    pub site: CallSite,
    key: u64,
}

thread_local! {
    static HELD: RefCell<SmallVec<[HeldLatch; 8]>> = const { RefCell::new(SmallVec::new_const()) };
}

/// Returns the latches the calling thread holds through tracking policies,
/// oldest first.
#[must_use]
pub fn held_latches() -> Vec<HeldLatch> {
    HELD.with(|held| held.borrow().to_vec())
}

/// Validates that the calling thread may acquire `id` (instance `key`).
pub(crate) fn check_enter(key: u64, id: LatchId, site: CallSite) {
    let violation = HELD.with(|held| {
        let held = held.borrow();
        if let Some(same) = held.iter().find(|h| h.key == key) {
            return Some(format!(
                "latch {id} re-entered at {site}; already held since {}",
                same.site
            ));
        }
        if !id.level.is_ordered() {
            return None;
        }
        held.iter()
            .find(|h| h.id.level.is_ordered() && h.id.level <= id.level)
            .map(|blocking| {
                let mut msg = format!(
                    "latch order violation: acquiring {id} at {site} while holding {} (acquired at {})",
                    blocking.id, blocking.site
                );
                let _ = write!(msg, "; held:");
                for h in held.iter() {
                    let _ = write!(msg, " {}@{}", h.id, h.site);
                }
                msg
            })
    });
    if let Some(msg) = violation {
        error!(latch = %id.name, %site, "{msg}");
        panic!("{msg}");
    }
}

/// Records that the calling thread now holds `key`.
pub(crate) fn push(key: u64, id: LatchId, site: CallSite) {
    HELD.with(|held| held.borrow_mut().push(HeldLatch { id, site, key }));
}

/// Forgets `key`. Latches may be released in any order.
pub(crate) fn remove(key: u64) {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if let Some(pos) = held.iter().rposition(|h| h.key == key) {
            held.remove(pos);
        }
    });
}
