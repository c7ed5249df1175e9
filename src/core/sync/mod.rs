/*!
 * Synchronization Primitives
 *
 * Portable mutex, recursive mutex, and condition variable over three
 * interchangeable backends:
 * - Native: OS threads on parking_lot
 * - Spin: cooperative tasks, locks built from an atomic word and yields
 * - Tasklet: cooperative tasks, runtime ticket lock
 *
 * # Architecture
 *
 * `Mutex<B, P>` and `Condition<B>` are thin, monomorphized wrappers over a
 * backend's `RawLock` and `RawCond`. The `P` parameter is the lock probe:
 * instrumented in debug builds, zero-sized in release builds.
 *
 * Both cooperative backends share the FIFO condition in `fifo`, which needs
 * nothing from the runtime but `yield_now`.
 */

mod atomic;
mod backends;
mod condition;
mod config;
mod fifo;
mod mutex;
mod probe;
pub mod runtime;
pub mod threads;
mod traits;

pub use atomic::{AtomicLock, SpinCell};
pub use backends::{
    ActiveBackend, NativeBackend, NativeCond, NativeLock, SpinBackend, SpinLock, TaskletBackend,
    TicketLock,
};
pub use condition::Condition;
pub use config::{BackendKind, SyncConfig};
pub use fifo::FifoCond;
pub use mutex::{Mutex, MutexGuard};
pub use probe::{ActiveProbe, Bare, Instrumented, LockProbe, LockSite, SiteCell};
pub use runtime::RuntimeHooks;
pub use traits::{Backend, RawCond, RawLock, Relax, Spin, TryLock, WakeResult, Yield};
