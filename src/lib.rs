/*!
 * Portable Sync Library
 * Mutexes and condition variables over native or cooperative threading
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::sync::{
    runtime, threads, ActiveBackend, Backend, BackendKind, Condition, Mutex, MutexGuard,
    NativeBackend, RuntimeHooks, SpinBackend, SyncConfig, TaskletBackend, TryLock, WakeResult,
};
pub use monitoring::{init_tracing, span_phase, PhaseSpan};
