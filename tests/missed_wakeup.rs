#![allow(missing_docs)]
//! No-missed-wakeup stress for the blocking hybrids.
//!
//! Every round one holder takes the lock, releases the waiters into `enter`,
//! lingers for a random number of pause units and exits. The waiters then
//! each take and release the lock once. Any waiter left asleep stalls the
//! round barrier and trips the watchdog.
//!
//! The event mutexes here park in a private sync array with no hang-scan
//! monitor, so only the release path can wake them.

mod common;

use common::{assert_with_log, init_test_logging, test_complete, test_phase, with_watchdog};
use policy_mutex::util::{BackoffRng, delay};
use policy_mutex::{
    DefaultPolicy, EventEngine, LatchId, LatchLevel, LockEngine, PolicyMutex, SyncArray, WaitQueue,
    call_site,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const ROUNDS: usize = 10_000;
const WAITERS: usize = 3;
const WATCHDOG: Duration = Duration::from_secs(300);

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

fn stress<E: LockEngine>(name: &'static str, mutex: PolicyMutex<E>) -> PolicyMutex<E> {
    init_test(name);
    let mutex = Arc::new(mutex);
    let holders = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(WAITERS + 1));
    let end = Arc::new(Barrier::new(WAITERS + 1));

    let acquisitions = {
        let mutex = Arc::clone(&mutex);
        let holders = Arc::clone(&holders);
        with_watchdog(name, WATCHDOG, move || {
            let waiters: Vec<_> = (0..WAITERS)
                .map(|w| {
                    let mutex = Arc::clone(&mutex);
                    let holders = Arc::clone(&holders);
                    let start = Arc::clone(&start);
                    let end = Arc::clone(&end);
                    thread::spawn(move || {
                        let mut rng = BackoffRng::new(0x5EED_0000 + w as u64);
                        let mut acquired = 0usize;
                        for _ in 0..ROUNDS {
                            start.wait();
                            delay(rng.interval(0, 3));
                            mutex.enter(2, 1, call_site!());
                            assert_eq!(holders.fetch_add(1, Ordering::Relaxed), 0);
                            holders.fetch_sub(1, Ordering::Relaxed);
                            mutex.exit();
                            acquired += 1;
                            end.wait();
                        }
                        acquired
                    })
                })
                .collect();

            let mut rng = BackoffRng::new(0xC0FF_EE00);
            for _ in 0..ROUNDS {
                mutex.enter(2, 1, call_site!());
                start.wait();
                delay(rng.interval(0, 8));
                mutex.exit();
                end.wait();
            }

            waiters
                .into_iter()
                .map(|w| w.join().expect("waiter panicked"))
                .sum::<usize>()
        })
    };

    let expected = ROUNDS * WAITERS;
    assert_with_log!(acquisitions == expected, "every waiter acquired every round", expected, acquisitions);
    assert_with_log!(!mutex.is_locked(), "released", false, mutex.is_locked());
    test_complete!(name);

    match Arc::try_unwrap(mutex) {
        Ok(mutex) => mutex,
        Err(_) => panic!("mutex still shared"),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn futex_never_misses_a_wakeup() {
    let mut mutex: PolicyMutex<policy_mutex::FutexEngine<DefaultPolicy>> = PolicyMutex::new();
    mutex.init(LatchId::new("futex_stress", LatchLevel::NO_ORDER), call_site!());
    let mut mutex = stress("futex_never_misses_a_wakeup", mutex);
    mutex.destroy();
}

#[test]
fn event_never_misses_a_wakeup() {
    let array = Arc::new(SyncArray::new());
    let engine = EventEngine::<DefaultPolicy>::with_wait_queue(Arc::clone(&array) as Arc<dyn WaitQueue>);
    let mut mutex = PolicyMutex::with_engine(engine);
    mutex.init(LatchId::new("event_stress", LatchLevel::NO_ORDER), call_site!());

    let mut mutex = stress("event_never_misses_a_wakeup", mutex);

    let stats = array.stats();
    assert_with_log!(stats.waiting == 0, "no parked threads left", 0, stats.waiting);
    assert_with_log!(stats.hang_wakeups == 0, "no hang scan ran", 0, stats.hang_wakeups);
    mutex.destroy();
}

/// A retry count of zero must not open a window between the waiter's
/// failed spin and its announcement: a release landing there has to be
/// seen by the waiter itself.
#[test]
fn event_with_zero_retries_never_misses_a_wakeup() {
    const HAND_OFFS: usize = 2_000;
    let name = "event_with_zero_retries_never_misses_a_wakeup";
    init_test(name);

    let array = Arc::new(SyncArray::new());
    let mut engine = EventEngine::<DefaultPolicy>::with_wait_queue(Arc::clone(&array) as Arc<dyn WaitQueue>);
    engine.set_wait_retries(0);
    let mut mutex = PolicyMutex::with_engine(engine);
    mutex.init(LatchId::new("event_zero_retries", LatchLevel::NO_ORDER), call_site!());
    let mutex = Arc::new(mutex);

    let completed = {
        let mutex = Arc::clone(&mutex);
        with_watchdog(name, Duration::from_secs(120), move || {
            let mut completed = 0usize;
            for _ in 0..HAND_OFFS {
                mutex.enter(1, 0, call_site!());
                let waiter = {
                    let mutex = Arc::clone(&mutex);
                    thread::spawn(move || {
                        mutex.enter(1, 0, call_site!());
                        mutex.exit();
                    })
                };
                thread::yield_now();
                mutex.exit();
                waiter.join().expect("waiter panicked");
                completed += 1;
            }
            completed
        })
    };

    assert_with_log!(completed == HAND_OFFS, "every hand-off completed", HAND_OFFS, completed);
    let stats = array.stats();
    assert_with_log!(stats.waiting == 0, "no parked threads left", 0, stats.waiting);
    assert_with_log!(stats.hang_wakeups == 0, "no hang scan ran", 0, stats.hang_wakeups);

    let mut mutex = match Arc::try_unwrap(mutex) {
        Ok(mutex) => mutex,
        Err(_) => panic!("mutex still shared"),
    };
    mutex.destroy();
    test_complete!(name);
}
