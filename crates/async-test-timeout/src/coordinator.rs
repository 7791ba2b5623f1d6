//! Runs one test body against its bound.

use crate::config::TimeoutConfig;
use crate::error::{TimeoutError, TimeoutFailure};
use crate::events::{Listeners, TimeoutEvent};
use crate::report::TestContext;
use crate::sink::DumpSink;
use crate::worker::{Interrupter, WorkerHandle, WorkerOutcome};
use async_test_timeout_probes::{DebugProbes, DiagnosticSnapshot, Instrumentation};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

static DEFAULT_COORDINATOR: LazyLock<Coordinator> = LazyLock::new(Coordinator::new);

/// Runs `body` under `config` with the default coordinator.
///
/// The default coordinator uses the global [`DebugProbes`] and has no
/// listeners. See [`Coordinator::run`].
#[track_caller]
pub fn run_with_timeout<T, E, F>(
    body: F,
    config: &TimeoutConfig,
    ctx: &mut dyn TestContext,
) -> Result<T, TimeoutError<E>>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    DEFAULT_COORDINATOR.run(body, config, ctx)
}

/// Enforces per-test bounds and captures task dumps on expiry.
pub struct Coordinator {
    name: String,
    instrumentation: Arc<dyn Instrumentation>,
    event_listeners: Listeners,
}

impl Coordinator {
    /// A coordinator over the global task probes.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new coordinator builder.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// The name used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `body` on a worker thread and waits for it at most
    /// `config.duration()`.
    ///
    /// The bound starts once the worker reports that the body is about to
    /// run. A value or error returned in time is passed through unchanged,
    /// and a panic in the body is resumed on the calling thread with its
    /// original payload.
    ///
    /// When the bound elapses, one task snapshot is taken and written to
    /// the dump sink, the failure is built with the worker's stack,
    /// suspended work is cancelled if the config asks for it, and
    /// [`TimeoutError::Timeout`] is returned. The worker is interrupted and
    /// left running.
    ///
    /// On every exit path, panics included, the worker is interrupted, the
    /// instrumentation is uninstalled and a non-empty captured dump is
    /// published to `ctx`.
    ///
    /// The instrumentation is process-wide: invocations sharing it must not
    /// overlap.
    #[track_caller]
    pub fn run<T, E, F>(
        &self,
        body: F,
        config: &TimeoutConfig,
        ctx: &mut dyn TestContext,
    ) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let entry = Location::caller();
        let invocation = ctx.display_name().to_string();
        let sink = DumpSink::for_context(ctx);

        self.instrumentation.install(config.probe_options());
        let mut scope = InvocationScope {
            instrumentation: &*self.instrumentation,
            interrupter: None,
            sink: Some(sink),
            ctx,
        };

        let worker = match WorkerHandle::spawn(&invocation, body) {
            Ok(worker) => worker,
            Err(err) => return Err(self.worker_failure(&invocation, err)),
        };
        scope.interrupter = Some(worker.interrupter());

        if !worker.await_started() {
            return Err(self.worker_failure(
                &invocation,
                io::Error::other("timeout worker exited before starting"),
            ));
        }

        let start = Instant::now();
        self.event_listeners.emit(&TimeoutEvent::Started {
            invocation: invocation.clone(),
            timestamp: start,
            bound: config.duration(),
        });

        match worker.await_completion(config.duration()) {
            WorkerOutcome::Completed(Ok(value)) => {
                self.completed(&invocation, start.elapsed(), "success");
                Ok(value)
            }
            WorkerOutcome::Completed(Err(err)) => {
                self.completed(&invocation, start.elapsed(), "error");
                Err(TimeoutError::Inner(err))
            }
            WorkerOutcome::Panicked(payload) => {
                self.completed(&invocation, start.elapsed(), "panic");
                drop(scope);
                panic::resume_unwind(payload)
            }
            WorkerOutcome::TimedOut => {
                let failure = self.timed_out(&worker, &mut scope, config, entry, invocation);
                Err(TimeoutError::Timeout(failure))
            }
            WorkerOutcome::Lost => Err(self.worker_failure(
                &invocation,
                io::Error::other("timeout worker exited without reporting"),
            )),
        }
    }

    fn completed(&self, invocation: &str, duration: Duration, result: &'static str) {
        let event = if result == "success" {
            TimeoutEvent::Succeeded {
                invocation: invocation.to_string(),
                timestamp: Instant::now(),
                duration,
            }
        } else {
            TimeoutEvent::Failed {
                invocation: invocation.to_string(),
                timestamp: Instant::now(),
                duration,
            }
        };
        self.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        {
            counter!("timeout_invocations_total", "coordinator" => self.name.clone(), "result" => result).increment(1);
            histogram!("timeout_invocation_duration_seconds", "coordinator" => self.name.clone())
                .record(duration.as_secs_f64());
        }

        #[cfg(feature = "tracing")]
        debug!(
            coordinator = %self.name,
            invocation = %invocation,
            result,
            duration_ms = duration.as_millis(),
            "Test body finished within its bound"
        );
    }

    fn timed_out<T, E>(
        &self,
        worker: &WorkerHandle<T, E>,
        scope: &mut InvocationScope<'_>,
        config: &TimeoutConfig,
        entry: &'static Location<'static>,
        invocation: String,
    ) -> TimeoutFailure {
        let snapshot = self.instrumentation.snapshot();
        if let Err(_err) = scope.write_snapshot(&snapshot) {
            #[cfg(feature = "tracing")]
            warn!(invocation = %invocation, error = %_err, "Failed to write task dump");
        }

        let stack = worker.stack_trace(&snapshot, entry);
        let failure = TimeoutFailure::new(invocation.clone(), config.duration(), stack);

        self.event_listeners.emit(&TimeoutEvent::TimedOut {
            invocation: invocation.clone(),
            timestamp: Instant::now(),
            bound: config.duration(),
        });

        #[cfg(feature = "metrics")]
        {
            counter!("timeout_invocations_total", "coordinator" => self.name.clone(), "result" => "timeout").increment(1);
        }

        #[cfg(feature = "tracing")]
        warn!(
            coordinator = %self.name,
            invocation = %invocation,
            bound_ms = config.duration().as_millis(),
            tasks = snapshot.len(),
            "Test body exceeded its bound"
        );

        if config.cancel_on_timeout() {
            self.cancel_suspended(&invocation);
        }

        if let Err(_err) = scope.flush() {
            #[cfg(feature = "tracing")]
            warn!(invocation = %invocation, error = %_err, "Failed to flush task dump");
        }

        failure
    }

    fn cancel_suspended(&self, invocation: &str) {
        let mut cancelled = 0;
        let mut failed = 0;

        for work in self.instrumentation.suspended_work() {
            match work.cancel() {
                Ok(()) => cancelled += 1,
                Err(_err) => {
                    failed += 1;
                    #[cfg(feature = "tracing")]
                    warn!(invocation = %invocation, error = %_err, "Failed to cancel suspended task");
                }
            }
        }

        self.event_listeners.emit(&TimeoutEvent::Cancelled {
            invocation: invocation.to_string(),
            timestamp: Instant::now(),
            cancelled,
            failed,
        });

        #[cfg(feature = "tracing")]
        debug!(invocation = %invocation, cancelled, failed, "Cancelled suspended work");
    }

    fn worker_failure<E>(&self, _invocation: &str, err: io::Error) -> TimeoutError<E> {
        #[cfg(feature = "metrics")]
        {
            counter!("timeout_invocations_total", "coordinator" => self.name.clone(), "result" => "worker_error").increment(1);
        }

        #[cfg(feature = "tracing")]
        warn!(invocation = %_invocation, error = %err, "Timeout worker failed");

        TimeoutError::Worker(err)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring and constructing a [`Coordinator`].
pub struct CoordinatorBuilder {
    name: String,
    instrumentation: Arc<dyn Instrumentation>,
    event_listeners: Listeners,
}

impl CoordinatorBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("default"),
            instrumentation: Arc::new(DebugProbes),
            event_listeners: Listeners::default(),
        }
    }

    /// Sets the name of this coordinator for observability.
    ///
    /// Default: `"default"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the task instrumentation installed around each invocation.
    ///
    /// Default: [`DebugProbes`]
    pub fn instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Registers a callback that sees every [`TimeoutEvent`].
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&TimeoutEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(f);
        self
    }

    /// Registers a callback invoked when a body returns a value in time.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let TimeoutEvent::Succeeded { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback invoked when a body fails or panics in time.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let TimeoutEvent::Failed { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback invoked when a body exceeds its bound.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let TimeoutEvent::TimedOut { bound, .. } = event {
                f(*bound);
            }
        });
        self
    }

    /// Registers a callback invoked after suspended work was cancelled,
    /// with the number of successful and failed cancellations.
    pub fn on_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let TimeoutEvent::Cancelled {
                cancelled, failed, ..
            } = event
            {
                f(*cancelled, *failed);
            }
        });
        self
    }

    /// Builds the coordinator.
    pub fn build(self) -> Coordinator {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "timeout_invocations_total",
                "Total number of timed test invocations (success, error, panic, timeout, or worker_error)"
            );
            describe_histogram!(
                "timeout_invocation_duration_seconds",
                "Duration of test bodies that finished within their bound"
            );
        }

        Coordinator {
            name: self.name,
            instrumentation: self.instrumentation,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tears an invocation down however it ends.
struct InvocationScope<'a> {
    instrumentation: &'a dyn Instrumentation,
    interrupter: Option<Interrupter>,
    sink: Option<DumpSink>,
    ctx: &'a mut dyn TestContext,
}

impl InvocationScope<'_> {
    fn write_snapshot(&mut self, snapshot: &DiagnosticSnapshot) -> io::Result<()> {
        match &mut self.sink {
            Some(sink) => sink.write_snapshot(snapshot),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for InvocationScope<'_> {
    fn drop(&mut self) {
        if let Some(interrupter) = &self.interrupter {
            interrupter.interrupt();
        }

        let instrumentation = self.instrumentation;
        if panic::catch_unwind(AssertUnwindSafe(|| instrumentation.uninstall())).is_err() {
            #[cfg(feature = "tracing")]
            warn!("Uninstalling task instrumentation panicked");
        }

        if let Some(sink) = self.sink.take() {
            if let Err(_err) = sink.close(&mut *self.ctx) {
                #[cfg(feature = "tracing")]
                warn!(error = %_err, "Failed to publish task dump");
            }
        }
    }
}
