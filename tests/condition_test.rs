/*!
 * Condition Variable Tests
 *
 * Wake ordering, broadcast scope, and lost-wakeup behavior
 */

use portable_sync::core::errors::SyncResult;
use portable_sync::core::sync::{FifoCond, RawCond, RawLock, SpinLock};
use portable_sync::{
    Backend, Condition, Mutex, NativeBackend, SpinBackend, TaskletBackend, TryLock, WakeResult,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Shared<B: Backend> {
    mutex: Mutex<B>,
    cond: Condition<B>,
    order: parking_lot::Mutex<Vec<usize>>,
}

impl<B: Backend> Shared<B> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            mutex: Mutex::new(),
            cond: Condition::new(),
            order: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

/// Lock, wait once, record `id`, unlock
fn spawn_waiter<B: Backend>(shared: &Arc<Shared<B>>, id: usize) -> JoinHandle<()> {
    let shared = shared.clone();
    thread::spawn(move || {
        shared.mutex.lock();
        shared.cond.wait(&shared.mutex);
        shared.order.lock().push(id);
        shared.mutex.unlock();
    })
}

fn wait_for(mut done: impl FnMut() -> bool) {
    while !done() {
        thread::sleep(Duration::from_millis(1));
    }
}

fn fifo_signal_order<B: Backend>() {
    let shared = Shared::<B>::new();

    let handles: Vec<_> = (1..=5)
        .map(|id| {
            let handle = spawn_waiter(&shared, id);
            // Enqueue strictly one after another
            wait_for(|| shared.cond.waiter_count() == id);
            handle
        })
        .collect();

    for k in 1..=5 {
        shared.mutex.lock();
        assert_eq!(shared.cond.signal(), WakeResult::Woken(1));
        shared.mutex.unlock();
        wait_for(|| shared.order.lock().len() == k);
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*shared.order.lock(), vec![1, 2, 3, 4, 5]);
}

fn broadcast_wakes_only_current_waiters<B: Backend>() {
    let shared = Shared::<B>::new();

    let early: Vec<_> = (1..=3).map(|id| spawn_waiter(&shared, id)).collect();
    wait_for(|| shared.cond.waiter_count() == 3);

    shared.mutex.lock();
    assert_eq!(shared.cond.broadcast(), WakeResult::Woken(3));
    shared.mutex.unlock();

    // Enqueued after the broadcast
    let late = spawn_waiter(&shared, 4);

    for handle in early {
        handle.join().unwrap();
    }
    wait_for(|| shared.cond.waiter_count() == 1);
    thread::sleep(Duration::from_millis(20));
    assert!(!late.is_finished());

    let mut woken = shared.order.lock().clone();
    woken.sort_unstable();
    assert_eq!(woken, vec![1, 2, 3]);

    shared.mutex.lock();
    assert_eq!(shared.cond.signal(), WakeResult::Woken(1));
    shared.mutex.unlock();
    late.join().unwrap();
    assert_eq!(shared.order.lock().len(), 4);
}

fn signal_without_waiters<B: Backend>() {
    let cond = Condition::<B>::new();
    assert_eq!(cond.signal(), WakeResult::NoWaiters);
    assert_eq!(cond.broadcast(), WakeResult::NoWaiters);
    cond.destroy();
}

fn wait_while_sees_predicate<B: Backend>() {
    let shared = Arc::new((Mutex::<B>::new(), Condition::<B>::new(), AtomicBool::new(false)));

    let waiter = {
        let shared = shared.clone();
        thread::spawn(move || {
            let (mutex, cond, ready) = &*shared;
            mutex.lock();
            cond.wait_while(mutex, || !ready.load(Ordering::Relaxed));
            let held = mutex.is_owned_by_current();
            mutex.unlock();
            held
        })
    };

    let (mutex, cond, ready) = &*shared;
    // Spurious signals before the predicate flips must not release it
    for _ in 0..10 {
        mutex.lock();
        let _ = cond.signal();
        mutex.unlock();
    }
    mutex.lock();
    ready.store(true, Ordering::Relaxed);
    let _ = cond.broadcast();
    mutex.unlock();

    assert!(waiter.join().unwrap());
}

fn waiter_releases_mutex<B: Backend>() {
    let shared = Shared::<B>::new();
    let handle = spawn_waiter(&shared, 1);
    wait_for(|| shared.cond.waiter_count() == 1);

    // The waiter gave the mutex up while blocked
    wait_for(|| shared.mutex.try_lock() == TryLock::Acquired);
    let _ = shared.cond.signal();
    shared.mutex.unlock();

    handle.join().unwrap();
}

macro_rules! condition_tests {
    ($name:ident, $backend:ty) => {
        mod $name {
            use super::*;

            #[test]
            fn test_broadcast_wakes_only_current_waiters() {
                broadcast_wakes_only_current_waiters::<$backend>();
            }

            #[test]
            fn test_signal_without_waiters() {
                signal_without_waiters::<$backend>();
            }

            #[test]
            fn test_wait_while_sees_predicate() {
                wait_while_sees_predicate::<$backend>();
            }

            #[test]
            fn test_waiter_releases_mutex() {
                waiter_releases_mutex::<$backend>();
            }
        }
    };
}

condition_tests!(native, NativeBackend);
condition_tests!(spin, SpinBackend);
condition_tests!(tasklet, TaskletBackend);

#[test]
fn test_fifo_signal_order_spin() {
    fifo_signal_order::<SpinBackend>();
}

#[test]
fn test_fifo_signal_order_tasklet() {
    fifo_signal_order::<TaskletBackend>();
}

/// Spinlock whose release stalls first, widening the window between a
/// waiter linking itself and giving up the caller's lock
struct SlowUnlock(SpinLock);

impl RawLock for SlowUnlock {
    const INIT: Self = SlowUnlock(SpinLock::INIT);
    const INIT_RECURSIVE: Self = SlowUnlock(SpinLock::INIT_RECURSIVE);

    fn lock(&self) -> SyncResult<()> {
        self.0.lock()
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        self.0.try_lock()
    }

    fn unlock(&self) -> SyncResult<()> {
        thread::sleep(Duration::from_millis(2));
        self.0.unlock()
    }

    fn is_recursive(&self) -> bool {
        self.0.is_recursive()
    }

    fn is_locked(&self) -> bool {
        self.0.is_locked()
    }

    fn is_owned_by_current(&self) -> bool {
        self.0.is_owned_by_current()
    }

    fn depth(&self) -> usize {
        self.0.depth()
    }
}

#[test]
fn test_no_lost_wakeup_with_delayed_release() {
    for _ in 0..20 {
        let shared = Arc::new((SlowUnlock::INIT, FifoCond::new()));

        let waiter = {
            let shared = shared.clone();
            thread::spawn(move || {
                let (lock, cond) = &*shared;
                lock.lock().unwrap();
                RawCond::<SlowUnlock>::wait(cond, lock).unwrap();
                let held = lock.is_owned_by_current();
                lock.unlock().unwrap();
                held
            })
        };

        // Signal as soon as the waiter is linked, most likely while its
        // release is still stalled
        let (_, cond) = &*shared;
        wait_for(|| RawCond::<SlowUnlock>::waiter_count(cond) == 1);
        assert_eq!(RawCond::<SlowUnlock>::signal(cond), WakeResult::Woken(1));

        assert!(waiter.join().unwrap());
    }
}
