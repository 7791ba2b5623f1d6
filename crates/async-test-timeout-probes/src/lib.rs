//! Task probes for diagnosing hung async tests.
//!
//! While installed, the probes keep a process-wide registry of every future
//! wrapped with [`track`], spawned with [`spawn`], or driven by
//! [`run_blocking`]. Each tracked task records its name, the thread it was
//! created on, its lifecycle state and, optionally, the call site and stack
//! at creation. A [`DiagnosticSnapshot`] of the registry can be rendered as
//! a text dump, and suspended tasks can be cancelled.
//!
//! A thread may bind an [`InterruptSignal`]. Raising it stops any
//! [`run_blocking`] call on that thread and refuses later ones.
//!
//! # Basic Example
//!
//! ```rust
//! use async_test_timeout_probes::{run_blocking, track, DebugProbes, Instrumentation, ProbeOptions};
//!
//! DebugProbes.install(ProbeOptions::default());
//!
//! let dump = run_blocking(|| async {
//!     let pending = track("never", std::future::pending::<()>());
//!     let dump = DebugProbes.snapshot().render();
//!     drop(pending);
//!     dump
//! })
//! .unwrap();
//!
//! DebugProbes.uninstall();
//! assert!(dump.contains("Task \"never\""));
//! ```
//!
//! # Dump format
//!
//! ```text
//! Tasks dump: 2 task(s) tracked
//!
//! Task "run_blocking" #1 on thread 'main', state: RUNNING
//!     created at tests/slow.rs:12:5
//!         at slow::body (tests/slow.rs:12:5)
//!
//! Task "reader" #2 on thread 'main', state: SUSPENDED
//!     created at tests/slow.rs:14:9
//! ```
//!
//! Creation lines appear only when [`ProbeOptions::creation_stack_traces`]
//! is set. [`ProbeOptions::sanitize_stack_traces`] strips standard library,
//! runtime and probe frames from them.
//!
//! # Reentrancy
//!
//! The registry is global. Installing while already installed replaces the
//! options and keeps the tracked tasks; the first uninstall ends tracking
//! for every user.
//!
//! # Feature Flags
//!
//! - `tracing`: emit install, uninstall and cancellation events through `tracing`

mod blocking;
mod error;
mod instrumentation;
mod interrupt;
mod registry;
mod snapshot;
mod tracked;

pub use blocking::run_blocking;
pub use error::{CancelError, RunError};
pub use instrumentation::{DebugProbes, Instrumentation};
pub use interrupt::InterruptSignal;
pub use registry::{ProbeOptions, SuspendedWork, TaskState};
pub use snapshot::{CreationSite, DiagnosticSnapshot, Frame, TaskSnapshot};
pub use tracked::{spawn, track, Tracked};
