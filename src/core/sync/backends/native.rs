/*!
 * Native Backend
 *
 * OS threads. Locks are parking_lot raw mutexes; condition waits park the
 * kernel thread through parking_lot_core, which maps to futex on Linux.
 *
 * # Lost Wakeups
 *
 * `park` queues the thread under the parking-lot bucket lock *before* it
 * runs `before_sleep`, and only `before_sleep` releases the caller's lock.
 * A signaler that takes the caller's lock after that point always finds the
 * waiter queued.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::runtime::os_thread_id;
use crate::core::sync::traits::{Backend, RawCond, RawLock, Spin, TryLock, WakeResult};
use parking_lot::lock_api::{RawMutex as _, RawReentrantMutex};
use parking_lot::{RawMutex, RawThreadId};
use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicUsize, Ordering};

/// OS-thread backend
pub struct NativeBackend;

impl Backend for NativeBackend {
    type Lock = NativeLock;
    type Cond = NativeCond;
    type Relax = Spin;

    const NAME: &'static str = "native";
}

/// Plain mutex with an owner word, or parking_lot's reentrant mutex
pub enum NativeLock {
    Plain {
        raw: RawMutex,
        /// Thread id of the holder, 0 when free
        owner: AtomicUsize,
    },
    Recursive {
        raw: RawReentrantMutex<RawMutex, RawThreadId>,
        /// Levels held; only touched by the holder
        depth: AtomicUsize,
    },
}

impl RawLock for NativeLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = NativeLock::Plain {
        raw: RawMutex::INIT,
        owner: AtomicUsize::new(0),
    };
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT_RECURSIVE: Self = NativeLock::Recursive {
        raw: RawReentrantMutex::INIT,
        depth: AtomicUsize::new(0),
    };

    fn lock(&self) -> SyncResult<()> {
        match self {
            NativeLock::Plain { raw, owner } => {
                let me = os_thread_id().get();
                if owner.load(Ordering::Relaxed) == me {
                    return Err(SyncError::Deadlock { task: me });
                }
                raw.lock();
                owner.store(me, Ordering::Relaxed);
            }
            NativeLock::Recursive { raw, depth } => {
                raw.lock();
                depth.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        match self {
            NativeLock::Plain { raw, owner } => {
                let me = os_thread_id().get();
                if owner.load(Ordering::Relaxed) == me {
                    return Err(SyncError::Deadlock { task: me });
                }
                if raw.try_lock() {
                    owner.store(me, Ordering::Relaxed);
                    Ok(TryLock::Acquired)
                } else {
                    Ok(TryLock::Busy)
                }
            }
            NativeLock::Recursive { raw, depth } => {
                if raw.try_lock() {
                    depth.fetch_add(1, Ordering::Relaxed);
                    Ok(TryLock::Acquired)
                } else {
                    Ok(TryLock::Busy)
                }
            }
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        if !self.is_owned_by_current() {
            return Err(SyncError::NotOwner {
                task: os_thread_id().get(),
            });
        }
        match self {
            NativeLock::Plain { raw, owner } => {
                owner.store(0, Ordering::Relaxed);
                // SAFETY: ownership by the calling thread was checked above
                unsafe { raw.unlock() };
            }
            NativeLock::Recursive { raw, depth } => {
                depth.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: ownership by the calling thread was checked above
                unsafe { raw.unlock() };
            }
        }
        Ok(())
    }

    fn is_recursive(&self) -> bool {
        matches!(self, NativeLock::Recursive { .. })
    }

    fn is_locked(&self) -> bool {
        match self {
            NativeLock::Plain { raw, .. } => raw.is_locked(),
            NativeLock::Recursive { raw, .. } => raw.is_locked(),
        }
    }

    fn is_owned_by_current(&self) -> bool {
        match self {
            NativeLock::Plain { owner, .. } => {
                owner.load(Ordering::Relaxed) == os_thread_id().get()
            }
            NativeLock::Recursive { raw, .. } => raw.is_owned_by_current_thread(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            NativeLock::Plain { raw, .. } => usize::from(raw.is_locked()),
            NativeLock::Recursive { depth, .. } => depth.load(Ordering::Relaxed),
        }
    }
}

/// Condition variable parked on its own address
pub struct NativeCond {
    waiters: AtomicUsize,
}

impl NativeCond {
    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }
}

impl RawCond<NativeLock> for NativeCond {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = NativeCond {
        waiters: AtomicUsize::new(0),
    };

    fn wait(&self, lock: &NativeLock) -> SyncResult<()> {
        let me = os_thread_id().get();
        if !lock.is_owned_by_current() {
            return Err(SyncError::NotOwner { task: me });
        }
        let depth = lock.depth();
        if depth > 1 {
            return Err(SyncError::NestedWait { task: me, depth });
        }

        self.waiters.fetch_add(1, Ordering::Relaxed);
        // SAFETY: the key is this condition's address, which stays valid
        // while `&self` is borrowed. `before_sleep` neither panics nor parks.
        unsafe {
            parking_lot_core::park(
                self.key(),
                || true,
                || {
                    let _ = lock.unlock();
                },
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                None,
            );
        }
        self.waiters.fetch_sub(1, Ordering::Relaxed);

        lock.lock()
    }

    fn signal(&self) -> WakeResult {
        // SAFETY: the callback does not call into parking_lot_core
        let result =
            unsafe { parking_lot_core::unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN) };
        WakeResult::from_count(result.unparked_threads)
    }

    fn broadcast(&self) -> WakeResult {
        // SAFETY: key is this condition's address
        let woken = unsafe { parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN) };
        WakeResult::from_count(woken)
    }

    fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}
