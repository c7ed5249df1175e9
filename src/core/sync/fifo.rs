/*!
 * FIFO Condition Variable
 *
 * Condition variable for cooperative runtimes, built from nothing but an
 * atomic spinlock and task yields.
 *
 * # Queue Layout
 *
 * Waiters are stack nodes owned by the task sitting in `wait`. The queue
 * grows at `head` and drains at `tail`; each node links to the next newer
 * node, so popping the tail is O(1) and always takes the oldest waiter.
 *
 * ```text
 *   tail (oldest) --newer--> ... --newer--> head (newest)
 * ```
 *
 * # Lost Wakeups
 *
 * A waiter is linked *before* it releases the caller's mutex. Any signal
 * issued after that release finds the node in the queue and flags it, and
 * the waiter's next poll sees the flag.
 *
 * # Node Lifetime
 *
 * A node leaves the queue either when a signaler pops it (and sets
 * `signaled` under the queue lock) or, if the waiting call unwinds first,
 * when the waiter unlinks itself. The waiter only returns after one of the
 * two, so the queue never points at a dead stack frame.
 */

use super::atomic::SpinCell;
use super::runtime;
use super::traits::{RawCond, RawLock, WakeResult, Yield};
use crate::core::errors::{SyncError, SyncResult};
use std::cell::Cell;
use std::ptr::NonNull;

/// One task blocked in `wait`
struct Waiter {
    signaled: Cell<bool>,
    newer: Cell<Option<NonNull<Waiter>>>,
}

impl Waiter {
    const fn new() -> Self {
        Self {
            signaled: Cell::new(false),
            newer: Cell::new(None),
        }
    }
}

/// Intrusive singly linked queue; only touched under the spinlock
struct WaitList {
    head: Option<NonNull<Waiter>>,
    tail: Option<NonNull<Waiter>>,
    len: usize,
}

// SAFETY: nodes are only dereferenced while the owning `SpinCell` is held,
// and a node outlives its membership in the list
unsafe impl Send for WaitList {}

impl WaitList {
    const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Link `node` as the newest waiter
    ///
    /// # Safety
    ///
    /// `node` must stay alive and unmoved until it is popped or removed.
    unsafe fn push_head(&mut self, node: NonNull<Waiter>) {
        match self.head {
            None => self.tail = Some(node),
            Some(head) => head.as_ref().newer.set(Some(node)),
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Unlink the oldest waiter and flag it
    fn signal_tail(&mut self) -> bool {
        let Some(tail) = self.tail else {
            return false;
        };
        // SAFETY: linked nodes are alive (push_head contract), and the
        // waiter cannot observe `signaled` until the queue lock drops
        unsafe {
            let node = tail.as_ref();
            self.tail = node.newer.get();
            node.newer.set(None);
            node.signaled.set(true);
        }
        if self.tail.is_none() {
            self.head = None;
        }
        self.len -= 1;
        true
    }

    /// Unlink `node` from anywhere in the queue; false if it is not linked
    fn remove(&mut self, node: NonNull<Waiter>) -> bool {
        let mut older: Option<NonNull<Waiter>> = None;
        let mut cursor = self.tail;
        while let Some(current) = cursor {
            // SAFETY: linked nodes are alive
            let next = unsafe { current.as_ref().newer.get() };
            if current == node {
                match older {
                    None => self.tail = next,
                    // SAFETY: as above
                    Some(prev) => unsafe { prev.as_ref().newer.set(next) },
                }
                if self.head == Some(node) {
                    self.head = older;
                }
                self.len -= 1;
                return true;
            }
            older = cursor;
            cursor = next;
        }
        false
    }
}

/// Hand-built condition variable: spinlock-guarded FIFO of stack waiters
pub struct FifoCond {
    queue: SpinCell<WaitList, Yield>,
}

impl FifoCond {
    pub const fn new() -> Self {
        Self {
            queue: SpinCell::new(WaitList::new()),
        }
    }

    /// Poll the waiter's flag under the queue lock
    #[inline]
    fn is_signaled(&self, waiter: &Waiter) -> bool {
        self.queue.with(|_| waiter.signaled.get())
    }
}

impl Default for FifoCond {
    fn default() -> Self {
        Self::new()
    }
}

/// Unlinks the waiter if `wait` unwinds before a signal arrives
struct Enqueued<'a> {
    cond: &'a FifoCond,
    node: NonNull<Waiter>,
}

impl Drop for Enqueued<'_> {
    fn drop(&mut self) {
        self.cond.queue.with(|list| {
            list.remove(self.node);
        });
    }
}

impl<L: RawLock> RawCond<L> for FifoCond {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = FifoCond::new();

    fn wait(&self, lock: &L) -> SyncResult<()> {
        let me = runtime::current_task();
        if !lock.is_owned_by_current() {
            return Err(SyncError::NotOwner { task: me });
        }
        // One unlock below must fully release the caller's lock
        let depth = lock.depth();
        if depth > 1 {
            return Err(SyncError::NestedWait { task: me, depth });
        }

        let waiter = Waiter::new();
        let node = NonNull::from(&waiter);
        // SAFETY: `waiter` is never moved, and `enqueued` (declared after it,
        // so dropped first) unlinks the node if this frame unwinds early
        self.queue.with(|list| unsafe { list.push_head(node) });
        let enqueued = Enqueued { cond: self, node };

        // Enqueued first, released second: no signal can slip in between
        let _ = lock.unlock();

        loop {
            runtime::yield_now();
            let _ = lock.lock();
            if self.is_signaled(&waiter) {
                break;
            }
            let _ = lock.unlock();
        }

        // Signaled nodes are already unlinked
        std::mem::forget(enqueued);
        Ok(())
    }

    fn signal(&self) -> WakeResult {
        let woken = self.queue.with(|list| list.signal_tail());
        WakeResult::from_count(usize::from(woken))
    }

    fn broadcast(&self) -> WakeResult {
        let woken = self.queue.with(|list| {
            let mut woken = 0;
            while list.signal_tail() {
                woken += 1;
            }
            woken
        });
        WakeResult::from_count(woken)
    }

    fn waiter_count(&self) -> usize {
        self.queue.with(|list| list.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes<const N: usize>() -> [Waiter; N] {
        std::array::from_fn(|_| Waiter::new())
    }

    #[test]
    fn test_signal_pops_oldest_first() {
        let waiters = nodes::<3>();
        let mut list = WaitList::new();
        for w in &waiters {
            unsafe { list.push_head(NonNull::from(w)) };
        }
        assert_eq!(list.len, 3);

        assert!(list.signal_tail());
        assert!(waiters[0].signaled.get());
        assert!(!waiters[1].signaled.get());

        assert!(list.signal_tail());
        assert!(list.signal_tail());
        assert!(waiters.iter().all(|w| w.signaled.get()));
        assert!(list.head.is_none() && list.tail.is_none());
        assert!(!list.signal_tail());
    }

    #[test]
    fn test_remove_middle_head_and_tail() {
        let waiters = nodes::<4>();
        let mut list = WaitList::new();
        for w in &waiters {
            unsafe { list.push_head(NonNull::from(w)) };
        }

        assert!(list.remove(NonNull::from(&waiters[1])));
        assert!(list.remove(NonNull::from(&waiters[3])));
        assert!(list.remove(NonNull::from(&waiters[0])));
        assert!(!list.remove(NonNull::from(&waiters[0])));
        assert_eq!(list.len, 1);
        assert_eq!(list.head, Some(NonNull::from(&waiters[2])));
        assert_eq!(list.tail, Some(NonNull::from(&waiters[2])));

        assert!(list.signal_tail());
        assert!(waiters[2].signaled.get());
        assert!(!waiters[1].signaled.get());
    }

    #[test]
    fn test_wait_rejects_nested_recursive_lock() {
        use crate::core::sync::backends::SpinLock;

        let lock = SpinLock::INIT_RECURSIVE;
        let cond = FifoCond::new();
        lock.lock().unwrap();
        lock.lock().unwrap();
        assert!(matches!(
            RawCond::<SpinLock>::wait(&cond, &lock),
            Err(SyncError::NestedWait { depth: 2, .. })
        ));
        assert_eq!(RawCond::<SpinLock>::waiter_count(&cond), 0);
        assert_eq!(lock.depth(), 2);
        lock.unlock().unwrap();
        lock.unlock().unwrap();
    }

    #[test]
    fn test_signal_without_waiters_is_noop() {
        let cond = FifoCond::new();
        assert_eq!(
            <FifoCond as RawCond<crate::core::sync::backends::SpinLock>>::signal(&cond),
            WakeResult::NoWaiters
        );
    }
}
