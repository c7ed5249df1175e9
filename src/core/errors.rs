/*!
 * Error Types
 * Synchronization failures with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for raw backend operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures reported by backend lock and condition operations
///
/// None of these are surfaced through the public `Mutex`/`Condition`
/// operations: the active lock probe decides whether a failure is reported
/// and asserted against (instrumented builds) or ignored (bare builds).
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Task {task} tried to re-acquire a non-recursive lock it already holds")]
    #[diagnostic(
        code(sync::deadlock),
        help("Use a recursive mutex, or release the lock before acquiring it again.")
    )]
    Deadlock { task: usize },

    #[error("Task {task} does not own the lock it tried to release")]
    #[diagnostic(
        code(sync::not_owner),
        help("Only the task that acquired a lock may release it.")
    )]
    NotOwner { task: usize },

    #[error("Task {task} waited on a recursive lock held {depth} levels deep")]
    #[diagnostic(
        code(sync::nested_wait),
        help("Release the extra levels before waiting; a wait only gives up one.")
    )]
    NestedWait { task: usize, depth: usize },

    #[error("Cooperative runtime hooks are already installed or in use")]
    #[diagnostic(
        code(sync::runtime_installed),
        help("Install runtime hooks once, before the first lock or wait operation.")
    )]
    RuntimeAlreadyInstalled,

    #[error("Invalid sync configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Check the SYNC_* environment variables.")
    )]
    InvalidConfig(String),
}

impl SyncError {
    /// Usage errors are caller bugs; everything else comes from setup
    #[inline]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            SyncError::Deadlock { .. } | SyncError::NotOwner { .. } | SyncError::NestedWait { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_classification() {
        assert!(SyncError::Deadlock { task: 1 }.is_usage_error());
        assert!(SyncError::NotOwner { task: 1 }.is_usage_error());
        assert!(SyncError::NestedWait { task: 1, depth: 2 }.is_usage_error());
        assert!(!SyncError::RuntimeAlreadyInstalled.is_usage_error());
        assert!(!SyncError::InvalidConfig("x".into()).is_usage_error());
    }

    #[test]
    fn test_error_messages_name_the_task() {
        let err = SyncError::NotOwner { task: 7 };
        assert!(err.to_string().contains("Task 7"));
    }
}
