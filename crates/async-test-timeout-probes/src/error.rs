//! Error types for task probes.

use std::io;
use thiserror::Error;

/// Errors returned by [`run_blocking`](crate::run_blocking).
#[derive(Debug, Error)]
pub enum RunError {
    /// The root task was cancelled through its probe handle.
    #[error("task was cancelled")]
    Cancelled,
    /// The calling thread's interrupt signal was raised.
    #[error("thread was interrupted")]
    Interrupted,
    /// The current-thread runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl RunError {
    /// Returns true if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }

    /// Returns true if the calling thread was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunError::Interrupted)
    }
}

/// Errors that can occur while cancelling a suspended task.
///
/// Cancellation is advisory; callers usually log these and move on.
#[derive(Debug, Error)]
pub enum CancelError {
    /// The task was registered without a way to cancel it.
    #[error("task {name:?} (#{id}) has no cancellation handle")]
    NotCancellable {
        /// Task id.
        id: u64,
        /// Task name.
        name: String,
    },
    /// The cancellation handle panicked.
    #[error("cancelling task {name:?} (#{id}) panicked")]
    Panicked {
        /// Task id.
        id: u64,
        /// Task name.
        name: String,
    },
}
