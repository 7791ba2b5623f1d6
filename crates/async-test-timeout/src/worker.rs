//! The isolated thread a timed test body runs on.
//!
//! Each invocation gets a fresh named thread. The thread reports back over
//! a channel, first that it started and then how the body ended. After a
//! timeout the thread is interrupted and left to finish on its own; Rust
//! threads never keep the process alive, so an orphaned worker cannot
//! block shutdown.
//!
//! Interruption is cooperative. Bodies that want to stop early poll
//! [`is_interrupted`] or wait with [`sleep`]. The worker binds its
//! [`InterruptSignal`] to the thread, so a [`run_blocking`] call on it
//! stops at its next suspension point and later calls are refused.
//!
//! [`run_blocking`]: crate::run_blocking

use crate::error::StackFrame;
use async_test_timeout_probes::{DiagnosticSnapshot, InterruptSignal};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

/// Returns true if the current thread is a timeout worker that has been
/// interrupted.
pub fn is_interrupted() -> bool {
    InterruptSignal::current().is_some_and(|signal| signal.is_raised())
}

/// Sleeps for `duration` or until the current worker is interrupted.
///
/// Returns false if the sleep was cut short by an interrupt.
pub fn sleep(duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if is_interrupted() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}

enum WorkerMessage<T, E> {
    Started,
    Finished(thread::Result<Result<T, E>>),
}

/// How the wait for a worker ended.
pub(crate) enum WorkerOutcome<T, E> {
    /// The body returned.
    Completed(Result<T, E>),
    /// The body panicked; carries the original payload.
    Panicked(Box<dyn Any + Send + 'static>),
    /// The bound elapsed first.
    TimedOut,
    /// The worker went away without reporting.
    Lost,
}

/// Interrupts a worker thread.
#[derive(Debug, Clone)]
pub(crate) struct Interrupter {
    signal: Arc<InterruptSignal>,
    thread: Thread,
}

impl Interrupter {
    pub(crate) fn interrupt(&self) {
        self.signal.raise();
        self.thread.unpark();
    }
}

/// One running test body.
pub(crate) struct WorkerHandle<T, E> {
    receiver: Receiver<WorkerMessage<T, E>>,
    interrupter: Interrupter,
}

impl<T, E> WorkerHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Starts `body` on a new thread named after the test.
    pub(crate) fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let signal = InterruptSignal::new();
        let worker_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(thread_name(name))
            .spawn(move || {
                InterruptSignal::bind_current_thread(worker_signal);
                if sender.send(WorkerMessage::Started).is_err() {
                    return;
                }
                let result = panic::catch_unwind(AssertUnwindSafe(body));
                // The coordinator may have stopped listening after a timeout.
                let _ = sender.send(WorkerMessage::Finished(result));
            })?;

        Ok(Self {
            receiver,
            interrupter: Interrupter {
                signal,
                thread: handle.thread().clone(),
            },
        })
    }
}

impl<T, E> WorkerHandle<T, E> {
    /// Blocks until the body is about to run. Returns false if the worker
    /// died first.
    pub(crate) fn await_started(&self) -> bool {
        matches!(self.receiver.recv(), Ok(WorkerMessage::Started))
    }

    /// Waits at most `bound` for the body to finish.
    pub(crate) fn await_completion(&self, bound: Duration) -> WorkerOutcome<T, E> {
        match self.receiver.recv_timeout(bound) {
            Ok(WorkerMessage::Finished(Ok(result))) => WorkerOutcome::Completed(result),
            Ok(WorkerMessage::Finished(Err(payload))) => WorkerOutcome::Panicked(payload),
            Ok(WorkerMessage::Started) | Err(RecvTimeoutError::Disconnected) => {
                WorkerOutcome::Lost
            }
            Err(RecvTimeoutError::Timeout) => WorkerOutcome::TimedOut,
        }
    }

    pub(crate) fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    pub(crate) fn id(&self) -> ThreadId {
        self.interrupter.thread.id()
    }

    /// The worker's logical stack: its tracked tasks, innermost first,
    /// followed by the body's entry site.
    pub(crate) fn stack_trace(
        &self,
        snapshot: &DiagnosticSnapshot,
        entry: &'static Location<'static>,
    ) -> Vec<StackFrame> {
        snapshot
            .tasks_on(self.id())
            .rev()
            .map(|task| StackFrame {
                function: task.name.clone(),
                location: task.creation.as_ref().map(|site| site.location.clone()),
            })
            .chain(std::iter::once(StackFrame::entry(entry)))
            .collect()
    }
}

fn thread_name(test: &str) -> String {
    format!("timeout-worker: {}", test.replace('\0', ""))
}
