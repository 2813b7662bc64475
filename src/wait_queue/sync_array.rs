//! Default wait-queue service.
//!
//! A [`SyncArray`] keeps one cell per parked thread. A cell remembers the
//! object the thread sleeps on, where it was parked, and the wake-event
//! signal count captured when the cell was reserved.
//!
//! The event engine's release path reads the waiters flag after unlocking.
//! Both sides of that exchange are fenced, but the array still offers a
//! periodic hang scan, [`SyncArray::wake_hanging_threads`], that sets the
//! event of every cell whose object is no longer locked. The scan is best
//! effort: it bounds how long a missed wake can stall a waiter, it does not
//! make wakes reliable on its own. [`SyncArray::spawn_monitor`] runs it on a
//! background thread.

#![allow(unsafe_code)]

use super::{WaitObject, WaitQueue};
use crate::config::MonitorConfig;
use crate::latch::{CallSite, LatchId};
use crate::tracing_compat::{debug, trace, warn};
use crate::util::thread as thread_id;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Borrowed object of a parked thread.
struct ObjectRef(NonNull<dyn WaitObject>);

// SAFETY: the pointee is `Send + Sync` (trait bound on `WaitObject`); the
// pointer is only dereferenced while the owning cell is registered, see
// `SyncArray::with_object`.
unsafe impl Send for ObjectRef {}

struct Cell {
    object: ObjectRef,
    latch: LatchId,
    site: CallSite,
    thread: u64,
    reserved_at: Instant,
    signal_count: u64,
}

#[derive(Default)]
struct Cells {
    slots: Vec<Option<Cell>>,
    free: Vec<usize>,
    in_use: usize,
}

impl Cells {
    fn reserve(&mut self, cell: Cell) -> usize {
        self.in_use += 1;
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(cell);
            slot
        } else {
            self.slots.push(Some(cell));
            self.slots.len() - 1
        }
    }

    fn release(&mut self, slot: usize) {
        let cell = self.slots.get_mut(slot).and_then(Option::take);
        assert!(cell.is_some(), "sync array: free of unreserved cell {slot}");
        self.in_use -= 1;
        self.free.push(slot);
    }

    fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.slots.iter().flatten()
    }
}

/// Counters of a [`SyncArray`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncArrayStats {
    /// Threads currently parked or about to park.
    pub waiting: usize,
    /// Cells reserved since creation.
    pub reservations: u64,
    /// Releases that found waiters announced.
    pub signals: u64,
    /// Waiters woken by the hang scan.
    pub hang_wakeups: u64,
}

/// A thread currently parked in a [`SyncArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParkedThread {
    /// Mutex it waits for.
    pub latch: LatchId,
    /// Where it called `enter`.
    pub site: CallSite,
    /// Numeric identity of the waiting thread.
    pub thread: u64,
    /// How long it has been waiting.
    pub waited: Duration,
    /// Wake-event signal count captured at reservation.
    pub signal_count: u64,
}

/// Array of wait cells, one per parked thread.
pub struct SyncArray {
    cells: Mutex<Cells>,
    reservations: AtomicU64,
    signals: AtomicU64,
    hang_wakeups: AtomicU64,
}

static GLOBAL: OnceLock<Arc<SyncArray>> = OnceLock::new();

impl SyncArray {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(Cells::default()),
            reservations: AtomicU64::new(0),
            signals: AtomicU64::new(0),
            hang_wakeups: AtomicU64::new(0),
        }
    }

    /// Process-wide array used by event mutexes unless they are given
    /// another queue.
    pub fn global() -> &'static Arc<Self> {
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SyncArrayStats {
        SyncArrayStats {
            waiting: self.cells.lock().in_use,
            reservations: self.reservations.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            hang_wakeups: self.hang_wakeups.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of every parked thread.
    #[must_use]
    pub fn parked(&self) -> Vec<ParkedThread> {
        let now = Instant::now();
        self.cells
            .lock()
            .iter()
            .map(|cell| ParkedThread {
                latch: cell.latch,
                site: cell.site,
                thread: cell.thread,
                waited: now.saturating_duration_since(cell.reserved_at),
                signal_count: cell.signal_count,
            })
            .collect()
    }

    /// Sets the wake event of every parked thread whose mutex is no longer
    /// locked. Returns how many events were set.
    pub fn wake_hanging_threads(&self) -> usize {
        let cells = self.cells.lock();
        let mut woken = 0;
        for cell in cells.iter() {
            // SAFETY: `cells` is locked and the cell is registered, so the
            // parking thread is still inside `park` borrowing the object.
            let object = unsafe { cell.object.0.as_ref() };
            if object.is_locked() {
                continue;
            }
            let Some(event) = object.wake_event() else {
                continue;
            };
            if !event.is_set() {
                event.set();
                woken += 1;
                warn!(
                    latch = %cell.latch,
                    site = %cell.site,
                    thread = cell.thread,
                    "woke a waiter on a free mutex"
                );
            }
        }
        drop(cells);
        self.hang_wakeups
            .fetch_add(woken as u64, Ordering::Relaxed);
        woken
    }

    /// Runs [`wake_hanging_threads`](Self::wake_hanging_threads) every
    /// `config.scan_interval` on a background thread until the returned
    /// handle is stopped or dropped.
    pub fn spawn_monitor(self: &Arc<Self>, config: MonitorConfig) -> io::Result<MonitorHandle> {
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let shared = Arc::new(MonitorShared::default());
        let array = Arc::clone(self);
        let interval = config.scan_interval;
        let thread = thread::Builder::new()
            .name("sync-array-monitor".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || monitor_loop(&array, &shared, interval)
            })?;

        debug!(interval_ms = interval.as_millis() as u64, "sync array monitor started");
        Ok(MonitorHandle {
            shared,
            thread: Some(thread),
        })
    }

    fn reserve(&self, object: &(dyn WaitObject + 'static), site: CallSite, signal_count: u64) -> usize {
        let cell = Cell {
            object: ObjectRef(NonNull::from(object)),
            latch: object.latch_id(),
            site,
            thread: thread_id::current().get(),
            reserved_at: Instant::now(),
            signal_count,
        };
        self.reservations.fetch_add(1, Ordering::Relaxed);
        self.cells.lock().reserve(cell)
    }

    fn free(&self, slot: usize) {
        self.cells.lock().release(slot);
    }
}

impl Default for SyncArray {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncArray")
            .field("stats", &self.stats())
            .finish()
    }
}

impl WaitQueue for SyncArray {
    fn park(&self, object: &(dyn WaitObject + 'static), site: CallSite, retries: u32) -> bool {
        let Some(event) = object.wake_event() else {
            panic!(
                "sync array: park on {} which has no wake event",
                object.latch_id()
            );
        };

        let signal_count = event.reset();
        let slot = self.reserve(object, site, signal_count);

        object.set_waiters();

        // At least one retry after announcing: a release that read the
        // waiters flag before it was set is only caught here.
        for _ in 0..retries.max(1) {
            if object.try_lock() {
                self.free(slot);
                return true;
            }
        }

        trace!(latch = %object.latch_id(), %site, slot, "parking");
        event.wait_low(signal_count);
        self.free(slot);
        trace!(latch = %object.latch_id(), %site, slot, "woken");
        false
    }

    fn wake(&self, object: &(dyn WaitObject + 'static)) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        trace!(latch = %object.latch_id(), "object signalled");
    }
}

#[derive(Default)]
struct MonitorShared {
    stopped: Mutex<bool>,
    cond: Condvar,
}

fn monitor_loop(array: &SyncArray, shared: &MonitorShared, interval: Duration) {
    let mut stopped = shared.stopped.lock();
    while !*stopped {
        shared.cond.wait_for(&mut stopped, interval);
        if *stopped {
            break;
        }
        MutexGuard::unlocked(&mut stopped, || {
            array.wake_hanging_threads();
        });
    }
    debug!("sync array monitor stopped");
}

/// Handle of a running hang-scan monitor. Dropping it stops the monitor.
pub struct MonitorHandle {
    shared: Arc<MonitorShared>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stops the monitor and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.shared.stopped.lock() = true;
        self.shared.cond.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("sync array monitor panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("running", &self.thread.is_some())
            .finish()
    }
}
