//! Per-thread interrupt signal observed by blocking runs.
//!
//! A thread that owns a test body binds an [`InterruptSignal`] once. Raising
//! it from any other thread makes a [`run_blocking`](crate::run_blocking)
//! call on the bound thread return [`RunError::Interrupted`](crate::RunError::Interrupted),
//! and makes any later call return it immediately.

use std::cell::OnceCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

thread_local! {
    static CURRENT: OnceCell<Arc<InterruptSignal>> = const { OnceCell::new() };
}

/// A one-shot interrupt flag that async code can wait on.
#[derive(Debug, Default)]
pub struct InterruptSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl InterruptSignal {
    /// Creates a signal that has not been raised.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raises the signal and wakes every waiter.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Returns true once the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Completes when the signal is raised.
    pub async fn raised(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Registered before the flag check so a concurrent raise is not lost.
        notified.as_mut().enable();
        if self.is_raised() {
            return;
        }
        notified.await;
    }

    /// Binds `signal` to the current thread.
    ///
    /// Returns false if the thread already has a signal; the existing one
    /// is kept.
    pub fn bind_current_thread(signal: Arc<InterruptSignal>) -> bool {
        CURRENT.with(|cell| cell.set(signal).is_ok())
    }

    /// The signal bound to the current thread, if any.
    pub fn current() -> Option<Arc<InterruptSignal>> {
        CURRENT.with(|cell| cell.get().cloned())
    }
}

pub(crate) async fn interrupted(signal: Option<&InterruptSignal>) {
    match signal {
        Some(signal) => signal.raised().await,
        None => std::future::pending().await,
    }
}
