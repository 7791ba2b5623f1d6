//! Blocking bridge from synchronous test bodies into async code.

use crate::error::RunError;
use crate::interrupt::{InterruptSignal, interrupted};
use crate::tracked::Tracked;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::sync::Notify;

#[cfg(feature = "tracing")]
use tracing::debug;

const ROOT_TASK_NAME: &str = "run_blocking";

/// Builds a future with `make` and runs it to completion on a fresh
/// current-thread runtime.
///
/// `make` is called inside the runtime, so it may create timers, I/O
/// resources and spawned tasks directly.
///
/// The future is registered with the task probes as a root task named
/// `run_blocking`, created at the call site. Cancelling that task through
/// the probes makes this function return [`RunError::Cancelled`]. Raising
/// the [`InterruptSignal`] bound to the calling thread makes it return
/// [`RunError::Interrupted`]. Either way the future and every task it
/// spawned are dropped at their current suspension points.
///
/// # Example
///
/// ```rust
/// use async_test_timeout_probes::run_blocking;
/// use std::time::Duration;
///
/// let value = run_blocking(|| async {
///     tokio::time::sleep(Duration::from_millis(1)).await;
///     1 + 1
/// })
/// .unwrap();
/// assert_eq!(value, 2);
/// ```
#[track_caller]
pub fn run_blocking<M, F>(make: M) -> Result<F::Output, RunError>
where
    M: FnOnce() -> F,
    F: Future,
{
    let location = Location::caller();
    let interrupt = InterruptSignal::current();
    if interrupt.as_ref().is_some_and(|signal| signal.is_raised()) {
        return Err(RunError::Interrupted);
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;

    runtime.block_on(async move {
        let cancelled = Arc::new(Notify::new());
        let tracked = Tracked::new(ROOT_TASK_NAME.to_string(), make(), location);
        if let Some(entry) = tracked.entry() {
            let notify = Arc::clone(&cancelled);
            entry.set_canceller(Arc::new(move || notify.notify_one()));
        }

        tokio::select! {
            biased;

            _ = cancelled.notified() => {
                #[cfg(feature = "tracing")]
                debug!(location = %location, "Blocking root task cancelled");
                Err(RunError::Cancelled)
            }
            _ = interrupted(interrupt.as_deref()) => {
                #[cfg(feature = "tracing")]
                debug!(location = %location, "Blocking root task interrupted");
                Err(RunError::Interrupted)
            }
            output = tracked => Ok(output),
        }
    })
}
