//! Futures registered with the task probes.

use crate::registry::{TaskEntry, TaskState, REGISTRY};
use pin_project_lite::pin_project;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// Keeps a task registered for as long as it is alive.
pub(crate) struct TaskGuard {
    entry: Option<Arc<TaskEntry>>,
}

impl TaskGuard {
    fn register(name: String, location: &'static Location<'static>) -> Self {
        Self {
            entry: REGISTRY.register(name, location),
        }
    }

    fn set_state(&self, state: TaskState) {
        if let Some(entry) = &self.entry {
            entry.set_state(state);
        }
    }

    fn release(&mut self) {
        if let Some(entry) = self.entry.take() {
            REGISTRY.deregister(entry.id());
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.release();
    }
}

pin_project! {
    /// A future tracked by the task probes.
    ///
    /// Created with [`track`]. When the probes are not installed at
    /// construction time the wrapper is a plain pass-through.
    pub struct Tracked<F> {
        #[pin]
        inner: F,
        guard: TaskGuard,
    }
}

impl<F> Tracked<F> {
    pub(crate) fn new(name: String, inner: F, location: &'static Location<'static>) -> Self {
        Self {
            inner,
            guard: TaskGuard::register(name, location),
        }
    }

    /// The registry id of this task, if it was registered.
    pub fn task_id(&self) -> Option<u64> {
        self.guard.entry.as_ref().map(|entry| entry.id())
    }

    /// Current state of this task, if it was registered.
    pub fn state(&self) -> Option<TaskState> {
        self.guard.entry.as_ref().map(|entry| entry.state())
    }

    pub(crate) fn entry(&self) -> Option<Arc<TaskEntry>> {
        self.guard.entry.clone()
    }
}

impl<F: Future> Future for Tracked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        this.guard.set_state(TaskState::Running);

        match this.inner.poll(cx) {
            Poll::Ready(output) => {
                this.guard.release();
                Poll::Ready(output)
            }
            Poll::Pending => {
                this.guard.set_state(TaskState::Suspended);
                Poll::Pending
            }
        }
    }
}

/// Wraps a future so it shows up in task dumps.
///
/// The call site is recorded as the task's creation site.
///
/// # Example
///
/// ```rust
/// use async_test_timeout_probes::track;
///
/// # async fn example() {
/// let answer = track("compute", async { 42 }).await;
/// assert_eq!(answer, 42);
/// # }
/// ```
#[track_caller]
pub fn track<F: Future>(name: impl Into<String>, future: F) -> Tracked<F> {
    Tracked::new(name.into(), future, Location::caller())
}

/// Spawns a tracked future on the current tokio runtime.
///
/// Cancelling the task through the probes aborts it.
///
/// # Panics
///
/// Panics if called from outside a tokio runtime.
#[track_caller]
pub fn spawn<F>(name: impl Into<String>, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let tracked = Tracked::new(name.into(), future, Location::caller());
    let entry = tracked.entry();
    let handle = tokio::spawn(tracked);

    if let Some(entry) = entry {
        let abort = handle.abort_handle();
        entry.set_canceller(Arc::new(move || abort.abort()));
    }

    handle
}
