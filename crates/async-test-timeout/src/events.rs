//! Invocation lifecycle events.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Events emitted by a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone)]
pub enum TimeoutEvent {
    /// The worker signalled that the body started; the bound runs from here.
    Started {
        /// Display name of the invocation.
        invocation: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured bound.
        bound: Duration,
    },
    /// The body returned a value within its bound.
    Succeeded {
        /// Display name of the invocation.
        invocation: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the body ran.
        duration: Duration,
    },
    /// The body returned an error or panicked within its bound.
    Failed {
        /// Display name of the invocation.
        invocation: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the body ran.
        duration: Duration,
    },
    /// The body exceeded its bound.
    TimedOut {
        /// Display name of the invocation.
        invocation: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured bound.
        bound: Duration,
    },
    /// Suspended work was cancelled after a timeout.
    Cancelled {
        /// Display name of the invocation.
        invocation: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Number of tasks whose cancellation was requested.
        cancelled: usize,
        /// Number of tasks that could not be cancelled.
        failed: usize,
    },
}

type Listener = Arc<dyn Fn(&TimeoutEvent) + Send + Sync>;

/// Callbacks registered on a coordinator.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    pub(crate) fn add<F>(&mut self, listener: F)
    where
        F: Fn(&TimeoutEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// A panicking listener is skipped; the rest still see the event.
    pub(crate) fn emit(&self, event: &TimeoutEvent) {
        for listener in &self.listeners {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
