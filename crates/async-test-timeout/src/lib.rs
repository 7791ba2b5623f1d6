//! Per-test timeouts for async test bodies, with task dumps on expiry.
//!
//! A timed test body runs on its own worker thread. The bound is measured
//! from the moment the worker reports that the body started. If the body
//! is still running when the bound elapses, the coordinator:
//!
//! 1. takes one snapshot of every tracked task and writes it to the dump
//!    sink,
//! 2. builds a [`TimeoutFailure`] whose stack is the worker's own (its
//!    tracked tasks, innermost first, ending at the body's entry site),
//! 3. cancels suspended work if `cancel_on_timeout` is set,
//! 4. returns the failure.
//!
//! Whatever happens, the worker is interrupted, the task probes are
//! uninstalled and a captured dump is published to the test's report.
//!
//! # Basic Example
//!
//! ```rust
//! use async_test_timeout::{run_blocking, run_with_timeout, RecordingContext, TimeoutConfig};
//! use std::time::Duration;
//!
//! let config = TimeoutConfig::new(Duration::from_secs(5));
//! let mut ctx = RecordingContext::new("fetches_value()");
//!
//! let value = run_with_timeout(
//!     || run_blocking(|| async { 40 + 2 }),
//!     &config,
//!     &mut ctx,
//! )
//! .unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! # Class and method settings
//!
//! Settings are written as ISO-8601 durations and resolved per method;
//! method settings replace class settings outright.
//!
//! ```rust
//! use async_test_timeout::{RecordingContext, TestOutcome, TimeoutExtension, TimeoutSettings};
//!
//! let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT1S")));
//! let method = TimeoutSettings::builder("PT0.1S").cancel_on_timeout(true).build();
//!
//! let mut ctx = RecordingContext::new("too_slow()");
//! let outcome = class.intercept(Some(&method), &mut ctx, || {
//!     async_test_timeout::worker::sleep(std::time::Duration::from_secs(2));
//!     Ok::<_, String>(())
//! });
//! assert!(matches!(outcome, TestOutcome::TimedOut(_)));
//! ```
//!
//! # Capturing dumps
//!
//! Task dumps go to stderr unless the test context sets the
//! [`CAPTURE_DUMP`] configuration parameter, in which case a non-empty dump
//! is published as the `dump` report entry. With [`EnvContext`] the
//! parameter is read from `ASYNC_TEST_TIMEOUT_CAPTURE_DUMP`.
//!
//! # Concurrency
//!
//! The default instrumentation is process-wide. Timed invocations that use
//! it must not run concurrently; run such tests serially.
//!
//! # Feature Flags
//!
//! - `tracing`: log invocation outcomes, dump failures and cancellation
//!   failures through `tracing`
//! - `metrics`: record invocation counts and body durations through `metrics`
//! - `serde`: deserialize [`TimeoutSettings`]

mod config;
mod coordinator;
mod duration;
mod error;
mod events;
mod extension;
mod outcome;
mod report;
mod sink;
pub mod worker;

pub use async_test_timeout_probes as probes;
pub use async_test_timeout_probes::{run_blocking, spawn, track, RunError};

pub use config::{TimeoutConfig, TimeoutSettings, TimeoutSettingsBuilder};
pub use coordinator::{run_with_timeout, Coordinator, CoordinatorBuilder};
pub use duration::{parse_duration, DurationParseError};
pub use error::{ConfigurationError, StackFrame, TimeoutError, TimeoutFailure};
pub use events::TimeoutEvent;
pub use extension::{ClassScope, TimeoutExtension};
pub use outcome::{TestOutcome, Verdict};
pub use report::{
    EnvContext, RecordingContext, ReportEntry, ReportError, TestContext, CAPTURE_DUMP,
    DUMP_ENTRY_KEY,
};
pub use sink::DumpSink;
