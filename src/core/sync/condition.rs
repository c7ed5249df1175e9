/*!
 * Condition Variable
 *
 * Backend-independent condition. `wait` atomically releases the caller's
 * mutex, waits for `signal`/`broadcast`, and reacquires the mutex before
 * returning. On the native backend this parks the OS thread; on the
 * cooperative backends it is the yield-and-poll FIFO condition.
 *
 * There is no timed wait and no cancellation: a waiter returns only after a
 * wake.
 */

use super::backends::ActiveBackend;
use super::mutex::{Mutex, MutexGuard};
use super::probe::LockProbe;
use super::traits::{Backend, RawCond, WakeResult};
use std::fmt;
use std::panic::Location;

/// Condition variable tied to the backend's mutex
///
/// # Examples
///
/// ```
/// use portable_sync::{Condition, Mutex};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::thread;
///
/// let shared: Arc<(Mutex, Condition, AtomicBool)> =
///     Arc::new((Mutex::new(), Condition::new(), AtomicBool::new(false)));
/// let producer = shared.clone();
///
/// thread::spawn(move || {
///     let (lock, cond, ready) = &*producer;
///     lock.lock();
///     ready.store(true, Ordering::Relaxed);
///     cond.signal();
///     lock.unlock();
/// });
///
/// let (lock, cond, ready) = &*shared;
/// lock.lock();
/// cond.wait_while(lock, || !ready.load(Ordering::Relaxed));
/// lock.unlock();
/// ```
pub struct Condition<B: Backend = ActiveBackend> {
    raw: B::Cond,
}

impl<B: Backend> Condition<B> {
    /// Condition with no waiters; usable in `static`s
    pub const fn new() -> Self {
        Self {
            raw: <B::Cond as RawCond<B::Lock>>::INIT,
        }
    }

    pub fn init() -> Self {
        Self::new()
    }

    /// Release `mutex`, wait for a wake, reacquire `mutex`.
    ///
    /// The caller must hold `mutex` (exactly once, if it is recursive).
    /// Wakeups may be spurious on the native backend; re-check the
    /// predicate, or use `wait_while`.
    #[track_caller]
    pub fn wait<P: LockProbe>(&self, mutex: &Mutex<B, P>) {
        B::ensure_init();
        let result = self.raw.wait(mutex.raw());
        P::locked(mutex.meta(), "wait", result, Location::caller());
    }

    /// Wait through a guard instead of a bare mutex
    #[track_caller]
    pub fn wait_guard<P: LockProbe>(&self, guard: &MutexGuard<'_, B, P>) {
        self.wait(guard.mutex());
    }

    /// Wait until `condition` returns false; checked before every wait
    #[track_caller]
    pub fn wait_while<P, F>(&self, mutex: &Mutex<B, P>, mut condition: F)
    where
        P: LockProbe,
        F: FnMut() -> bool,
    {
        while condition() {
            self.wait(mutex);
        }
    }

    /// Wake the longest-waiting task, if any
    #[inline]
    pub fn signal(&self) -> WakeResult {
        self.raw.signal()
    }

    /// Wake every task waiting right now
    #[inline]
    pub fn broadcast(&self) -> WakeResult {
        self.raw.broadcast()
    }

    /// Approximate number of waiting tasks (for diagnostics)
    pub fn waiter_count(&self) -> usize {
        self.raw.waiter_count()
    }

    /// Consume the condition. Waiters borrow it, so none can remain.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<B: Backend> Default for Condition<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Condition<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("backend", &B::NAME)
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
