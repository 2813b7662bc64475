//! Benchmarks for enter/exit on every engine, uncontended and contended.
//!
//! Policies are `NoPolicy` so the numbers measure the engines themselves.

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use policy_mutex::{
    EventEngine, LatchId, LatchLevel, LockEngine, NoPolicy, OsEngine, PolicyMutex, SpinConfig,
    SpinEngine, call_site,
};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const ID: LatchId = LatchId::new("bench", LatchLevel::NO_ORDER);

fn mutex<E: LockEngine>() -> PolicyMutex<E> {
    let mut mutex = PolicyMutex::new();
    mutex.init(ID, call_site!());
    mutex
}

// ---------------------------------------------------------------------------
// Uncontended
// ---------------------------------------------------------------------------

fn bench_uncontended_engine<E: LockEngine>(c: &mut Criterion, name: &str) {
    let config = SpinConfig::default();
    let m = mutex::<E>();
    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("enter_exit", name), |b| {
        b.iter(|| {
            m.lock(&config, call_site!());
            black_box(&m);
            m.exit();
        });
    });
    group.bench_function(BenchmarkId::new("try_lock_exit", name), |b| {
        b.iter(|| {
            if black_box(m.try_lock(call_site!())) {
                m.exit();
            }
        });
    });
    group.finish();
}

fn bench_uncontended(c: &mut Criterion) {
    bench_uncontended_engine::<OsEngine<NoPolicy>>(c, "os");
    bench_uncontended_engine::<SpinEngine<NoPolicy>>(c, "spin");
    #[cfg(target_os = "linux")]
    bench_uncontended_engine::<policy_mutex::FutexEngine<NoPolicy>>(c, "futex");
    bench_uncontended_engine::<EventEngine<NoPolicy>>(c, "event");
}

// ---------------------------------------------------------------------------
// Contended
// ---------------------------------------------------------------------------

/// Measures `iters` enter/exit pairs on the bench thread while `threads`
/// background threads hammer the same mutex.
fn contended_run<E: LockEngine>(threads: usize, iters: u64) -> Duration {
    let config = SpinConfig::default();
    let m = Arc::new(mutex::<E>());
    let stop = Arc::new(AtomicBool::new(false));
    let ready = Arc::new(Barrier::new(threads + 1));

    let background: Vec<_> = (0..threads)
        .map(|_| {
            let m = Arc::clone(&m);
            let stop = Arc::clone(&stop);
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                ready.wait();
                while !stop.load(Ordering::Relaxed) {
                    m.lock(&config, call_site!());
                    black_box(&m);
                    m.exit();
                }
            })
        })
        .collect();

    ready.wait();
    let start = Instant::now();
    for _ in 0..iters {
        m.lock(&config, call_site!());
        black_box(&m);
        m.exit();
    }
    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    for handle in background {
        handle.join().expect("background thread panicked");
    }
    elapsed
}

fn bench_contended_engine<E: LockEngine>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));
    for threads in [1usize, 3, 7] {
        group.bench_with_input(BenchmarkId::new(name, threads), &threads, |b, &threads| {
            b.iter_custom(|iters| contended_run::<E>(threads, iters));
        });
    }
    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    bench_contended_engine::<OsEngine<NoPolicy>>(c, "os");
    bench_contended_engine::<SpinEngine<NoPolicy>>(c, "spin");
    #[cfg(target_os = "linux")]
    bench_contended_engine::<policy_mutex::FutexEngine<NoPolicy>>(c, "futex");
    bench_contended_engine::<EventEngine<NoPolicy>>(c, "event");
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
