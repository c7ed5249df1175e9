/*!
 * Sync Stress - Main Entry Point
 *
 * Exercises the compiled-in backend:
 * - Counter contention on the backend lock
 * - Counter contention on the atomic fast path
 * - Single-slot producer/consumer handoff through a condition variable
 *
 * Exits non-zero if any check fails.
 */

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

use portable_sync::{init_tracing, span_phase, BackendKind, Condition, Mutex, SyncConfig};

/// Shared counter whose read-modify-write is only correct under a lock
struct Counter {
    mutex: Mutex,
    value: AtomicUsize,
}

impl Counter {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(),
            value: AtomicUsize::new(0),
        }
    }

    fn bump(&self) {
        let v = self.value.load(Ordering::Relaxed);
        self.value.store(v + 1, Ordering::Relaxed);
    }
}

fn run_workers<F>(workers: usize, work: F) -> Result<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let work = work.clone();
            thread::Builder::new()
                .name(format!("stress-{i}"))
                .spawn(move || work())
                .context("failed to spawn stress worker")
        })
        .collect::<Result<_>>()?;

    for handle in handles {
        if handle.join().is_err() {
            bail!("stress worker panicked");
        }
    }
    Ok(())
}

fn check(phase: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        error!(phase, expected, actual, "check failed");
        bail!("{phase}: expected {expected}, got {actual}");
    }
    info!(phase, total = actual, "check passed");
    Ok(())
}

fn lock_contention(config: &SyncConfig, backend: BackendKind) -> Result<()> {
    let span = span_phase("lock_contention", backend.name());
    let counter = Arc::new(Counter::new());
    let iterations = config.stress_iterations;

    let shared = counter.clone();
    run_workers(config.stress_workers, move || {
        for _ in 0..iterations {
            shared.mutex.lock();
            shared.bump();
            shared.mutex.unlock();
        }
    })?;

    let expected = config.stress_workers * iterations;
    span.record_operations(expected);
    let result = check("lock_contention", expected, counter.value.load(Ordering::Relaxed));
    span.record_result(result.is_ok());
    result
}

fn atomic_contention(config: &SyncConfig, backend: BackendKind) -> Result<()> {
    let span = span_phase("atomic_contention", backend.name());
    let counter = Arc::new(Counter::new());
    let iterations = config.stress_iterations;

    let shared = counter.clone();
    run_workers(config.stress_workers, move || {
        for _ in 0..iterations {
            shared.mutex.atomic_lock();
            shared.bump();
            shared.mutex.atomic_unlock();
        }
    })?;

    let expected = config.stress_workers * iterations;
    span.record_operations(expected);
    let result = check("atomic_contention", expected, counter.value.load(Ordering::Relaxed));
    span.record_result(result.is_ok());
    result
}

/// One producer and one consumer per worker pair, handing values through a
/// single slot. 0 means empty.
struct Slot {
    mutex: Mutex,
    changed: Condition,
    value: AtomicUsize,
    consumed: AtomicUsize,
}

fn handoff(config: &SyncConfig, backend: BackendKind) -> Result<()> {
    let span = span_phase("handoff", backend.name());
    let items = config.stress_iterations;
    let slot = Arc::new(Slot {
        mutex: Mutex::new(),
        changed: Condition::new(),
        value: AtomicUsize::new(0),
        consumed: AtomicUsize::new(0),
    });

    let producer = {
        let slot = slot.clone();
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || {
                for item in 1..=items {
                    slot.mutex.lock();
                    slot.changed
                        .wait_while(&slot.mutex, || slot.value.load(Ordering::Relaxed) != 0);
                    slot.value.store(item, Ordering::Relaxed);
                    slot.changed.broadcast();
                    slot.mutex.unlock();
                }
            })
            .context("failed to spawn producer")?
    };

    let consumer = {
        let slot = slot.clone();
        thread::Builder::new()
            .name("consumer".into())
            .spawn(move || {
                for _ in 0..items {
                    slot.mutex.lock();
                    slot.changed
                        .wait_while(&slot.mutex, || slot.value.load(Ordering::Relaxed) == 0);
                    let item = slot.value.swap(0, Ordering::Relaxed);
                    slot.consumed.fetch_add(item, Ordering::Relaxed);
                    slot.changed.broadcast();
                    slot.mutex.unlock();
                }
            })
            .context("failed to spawn consumer")?
    };

    if producer.join().is_err() || consumer.join().is_err() {
        bail!("handoff task panicked");
    }

    span.record_operations(items);
    let expected = items * (items + 1) / 2;
    let result = check("handoff", expected, slot.consumed.load(Ordering::Relaxed));
    span.record_result(result.is_ok());
    result
}

fn main() -> Result<()> {
    init_tracing();

    let config = SyncConfig::from_env().context("invalid SYNC_* configuration")?;
    config.apply();
    let backend = config.backend;

    info!(%backend, "sync-stress starting");

    lock_contention(&config, backend)?;
    atomic_contention(&config, backend)?;
    handoff(&config, backend)?;

    info!(%backend, "All checks passed");
    Ok(())
}
