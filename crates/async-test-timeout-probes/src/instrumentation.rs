//! The instrumentation seam used by timeout coordinators.

use crate::registry::{ProbeOptions, SuspendedWork, REGISTRY};
use crate::snapshot::DiagnosticSnapshot;
use std::io::{self, Write};

/// Process-wide task instrumentation.
///
/// Install is not reentrant: two overlapping install/uninstall pairs share
/// one global state, and the first uninstall ends tracking for both.
/// Coordinators serialize their use of it by running one invocation at a
/// time.
pub trait Instrumentation: Send + Sync {
    /// Starts tracking tasks created from now on.
    fn install(&self, options: ProbeOptions);

    /// Stops tracking and forgets every tracked task.
    fn uninstall(&self);

    /// Returns true while installed.
    fn is_installed(&self) -> bool;

    /// Captures the currently tracked tasks.
    fn snapshot(&self) -> DiagnosticSnapshot;

    /// Writes a dump of the currently tracked tasks.
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        self.snapshot().write_to(out)
    }

    /// Lists tracked tasks that are parked at a suspension point.
    fn suspended_work(&self) -> Vec<SuspendedWork>;
}

/// The instrumentation backed by the global task registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugProbes;

impl Instrumentation for DebugProbes {
    fn install(&self, options: ProbeOptions) {
        REGISTRY.install(options);
    }

    fn uninstall(&self) {
        REGISTRY.uninstall();
    }

    fn is_installed(&self) -> bool {
        REGISTRY.is_installed()
    }

    fn snapshot(&self) -> DiagnosticSnapshot {
        REGISTRY.snapshot()
    }

    fn suspended_work(&self) -> Vec<SuspendedWork> {
        REGISTRY.suspended_work()
    }
}
