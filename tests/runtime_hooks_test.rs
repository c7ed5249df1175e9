/*!
 * Cooperative Runtime Hook Tests
 *
 * Installs counting hooks for the whole test binary. Every test calls
 * `setup()` first, so the hooks are in place before any cooperative lock.
 */

use portable_sync::core::errors::SyncError;
use portable_sync::{runtime, Condition, Mutex, RuntimeHooks, SpinBackend, TaskletBackend};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;

static INITS: AtomicUsize = AtomicUsize::new(0);
static YIELDS: AtomicUsize = AtomicUsize::new(0);

fn counting_init() {
    INITS.fetch_add(1, Ordering::SeqCst);
}

fn counting_yield() {
    YIELDS.fetch_add(1, Ordering::Relaxed);
    thread::yield_now();
}

fn task_id() -> NonZeroUsize {
    (RuntimeHooks::os_threads().current_task)()
}

fn setup() {
    static SETUP: Once = Once::new();
    SETUP.call_once(|| {
        runtime::install(RuntimeHooks {
            init: counting_init,
            yield_now: counting_yield,
            current_task: task_id,
        })
        .unwrap();
    });
}

#[test]
fn test_second_install_rejected() {
    setup();
    assert!(runtime::is_installed());
    assert_eq!(
        runtime::install(RuntimeHooks::default()),
        Err(SyncError::RuntimeAlreadyInstalled)
    );
}

#[test]
fn test_init_runs_once() {
    setup();
    let mutex = Mutex::<SpinBackend>::new();
    for _ in 0..3 {
        mutex.lock();
        mutex.unlock();
    }
    runtime::ensure_init();
    assert_eq!(INITS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_yields_through_hook() {
    setup();
    let before = YIELDS.load(Ordering::Relaxed);
    let mutex = Mutex::<TaskletBackend>::new();
    mutex.lock();
    mutex.unlock();
    assert!(YIELDS.load(Ordering::Relaxed) > before);
}

#[test]
fn test_wait_polls_through_hook() {
    setup();
    let shared = Arc::new((Mutex::<SpinBackend>::new(), Condition::<SpinBackend>::new()));
    let before = YIELDS.load(Ordering::Relaxed);

    let waiter = {
        let shared = shared.clone();
        thread::spawn(move || {
            let (mutex, cond) = &*shared;
            mutex.lock();
            cond.wait(mutex);
            mutex.unlock();
        })
    };

    let (mutex, cond) = &*shared;
    while cond.waiter_count() == 0 {
        thread::yield_now();
    }
    mutex.lock();
    let _ = cond.signal();
    mutex.unlock();
    waiter.join().unwrap();

    assert!(YIELDS.load(Ordering::Relaxed) > before);
}

#[test]
fn test_task_ids_come_from_hook() {
    setup();
    assert_eq!(runtime::current_task(), task_id().get());
}
