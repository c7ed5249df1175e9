/*!
 * Backends
 *
 * One module per concurrency substrate:
 * - `native`: OS threads, parking_lot locks, futex-backed condition
 * - `spin`: cooperative tasks, yielding spinlock, FIFO condition
 * - `tasklet`: cooperative tasks, yielding ticket lock, FIFO condition
 *
 * The `backend-*` features pick `ActiveBackend`. If several are enabled,
 * spin wins over tasklet, and both win over native.
 */

mod native;
mod spin;
mod tasklet;

pub use native::{NativeBackend, NativeCond, NativeLock};
pub use spin::{SpinBackend, SpinLock};
pub use tasklet::{TaskletBackend, TicketLock};

/// Backend behind the default `Mutex` and `Condition` type parameters
#[cfg(feature = "backend-spin")]
pub type ActiveBackend = SpinBackend;

/// Backend behind the default `Mutex` and `Condition` type parameters
#[cfg(all(feature = "backend-tasklet", not(feature = "backend-spin")))]
pub type ActiveBackend = TaskletBackend;

/// Backend behind the default `Mutex` and `Condition` type parameters
#[cfg(not(any(feature = "backend-spin", feature = "backend-tasklet")))]
pub type ActiveBackend = NativeBackend;
