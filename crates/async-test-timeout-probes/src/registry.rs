//! Process-wide registry of tracked tasks.

use crate::error::CancelError;
use crate::snapshot::{parse_frames, sanitize_frames, CreationSite, DiagnosticSnapshot, TaskSnapshot};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Options applied while the probes are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Capture the creation site and stack of every tracked task.
    ///
    /// Default: true
    pub creation_stack_traces: bool,
    /// Strip runtime and probe frames from creation stacks in dumps.
    ///
    /// Default: false
    pub sanitize_stack_traces: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            creation_stack_traces: true,
            sanitize_stack_traces: false,
        }
    }
}

impl ProbeOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether creation stacks are captured.
    pub fn with_creation_stack_traces(mut self, enabled: bool) -> Self {
        self.creation_stack_traces = enabled;
        self
    }

    /// Set whether creation stacks are sanitized in dumps.
    pub fn with_sanitize_stack_traces(mut self, enabled: bool) -> Self {
        self.sanitize_stack_traces = enabled;
        self
    }
}

/// Lifecycle state of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Registered but never polled.
    Created,
    /// Currently being polled.
    Running,
    /// Parked at a suspension point.
    Suspended,
}

impl TaskState {
    /// The token used for this state in task dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "CREATED",
            TaskState::Running => "RUNNING",
            TaskState::Suspended => "SUSPENDED",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TaskState::Running,
            2 => TaskState::Suspended,
            _ => TaskState::Created,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskState::Created => 0,
            TaskState::Running => 1,
            TaskState::Suspended => 2,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type Canceller = Arc<dyn Fn() + Send + Sync>;

struct Creation {
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

/// Registry-side state of one tracked task.
pub(crate) struct TaskEntry {
    id: u64,
    name: String,
    thread_id: ThreadId,
    thread_name: Option<String>,
    creation: Option<Creation>,
    state: AtomicU8,
    canceller: Mutex<Option<Canceller>>,
}

impl TaskEntry {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn set_canceller(&self, canceller: Canceller) {
        *lock(&self.canceller) = Some(canceller);
    }

    fn snapshot(&self, sanitize: bool) -> TaskSnapshot {
        let creation = self.creation.as_ref().map(|creation| {
            let frames = parse_frames(&creation.backtrace);
            CreationSite {
                location: creation.location.to_string(),
                frames: if sanitize {
                    sanitize_frames(frames)
                } else {
                    frames
                },
            }
        });

        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state(),
            thread_id: self.thread_id,
            thread_name: self.thread_name.clone(),
            creation,
        }
    }
}

/// A suspended unit of work that may be cancelled.
#[derive(Clone)]
pub struct SuspendedWork {
    id: u64,
    name: String,
    canceller: Option<Canceller>,
}

impl SuspendedWork {
    /// Creates a cancellable work item.
    pub fn new<F>(id: u64, name: impl Into<String>, cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            name: name.into(),
            canceller: Some(Arc::new(cancel)),
        }
    }

    /// Creates a work item without a cancellation handle.
    pub fn detached(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            canceller: None,
        }
    }

    /// The task id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this work item carries a cancellation handle.
    pub fn is_cancellable(&self) -> bool {
        self.canceller.is_some()
    }

    /// Requests cancellation of the unit of work owning this task.
    ///
    /// Does not wait for the task to observe the request.
    pub fn cancel(&self) -> Result<(), CancelError> {
        let Some(canceller) = &self.canceller else {
            return Err(CancelError::NotCancellable {
                id: self.id,
                name: self.name.clone(),
            });
        };

        panic::catch_unwind(AssertUnwindSafe(|| canceller())).map_err(|_| CancelError::Panicked {
            id: self.id,
            name: self.name.clone(),
        })
    }
}

impl fmt::Debug for SuspendedWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendedWork")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cancellable", &self.is_cancellable())
            .finish()
    }
}

/// Tracks live tasks while installed.
pub(crate) struct Registry {
    installed: AtomicBool,
    options: Mutex<ProbeOptions>,
    tasks: Mutex<BTreeMap<u64, Arc<TaskEntry>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
            options: Mutex::new(ProbeOptions::default()),
            tasks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn install(&self, options: ProbeOptions) {
        let tasks = lock(&self.tasks);
        *lock(&self.options) = options;
        let was_installed = self.installed.swap(true, Ordering::AcqRel);
        drop(tasks);

        #[cfg(feature = "tracing")]
        {
            if was_installed {
                warn!("Task probes installed while already installed; options replaced");
            } else {
                debug!(
                    creation_stack_traces = options.creation_stack_traces,
                    sanitize_stack_traces = options.sanitize_stack_traces,
                    "Task probes installed"
                );
            }
        }
        #[cfg(not(feature = "tracing"))]
        let _ = was_installed;
    }

    pub(crate) fn uninstall(&self) {
        let mut tasks = lock(&self.tasks);
        self.installed.store(false, Ordering::Release);
        let _dropped = tasks.len();
        tasks.clear();

        #[cfg(feature = "tracing")]
        debug!(dropped = _dropped, "Task probes uninstalled");
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    pub(crate) fn register(
        &self,
        name: String,
        location: &'static Location<'static>,
    ) -> Option<Arc<TaskEntry>> {
        if !self.is_installed() {
            return None;
        }

        let options = *lock(&self.options);
        let creation = options.creation_stack_traces.then(|| Creation {
            location,
            backtrace: Backtrace::force_capture(),
        });
        let current = thread::current();
        let entry = Arc::new(TaskEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name,
            thread_id: current.id(),
            thread_name: current.name().map(str::to_owned),
            creation,
            state: AtomicU8::new(TaskState::Created.as_u8()),
            canceller: Mutex::new(None),
        });

        // Re-checked under the lock so an uninstall racing with us cannot
        // leave a stale entry behind.
        let mut tasks = lock(&self.tasks);
        if !self.is_installed() {
            return None;
        }
        tasks.insert(entry.id, Arc::clone(&entry));
        Some(entry)
    }

    pub(crate) fn deregister(&self, id: u64) {
        lock(&self.tasks).remove(&id);
    }

    pub(crate) fn snapshot(&self) -> DiagnosticSnapshot {
        let sanitize = lock(&self.options).sanitize_stack_traces;
        let entries: Vec<Arc<TaskEntry>> = lock(&self.tasks).values().cloned().collect();
        DiagnosticSnapshot::new(entries.iter().map(|entry| entry.snapshot(sanitize)).collect())
    }

    pub(crate) fn suspended_work(&self) -> Vec<SuspendedWork> {
        lock(&self.tasks)
            .values()
            .filter(|entry| entry.state() == TaskState::Suspended)
            .map(|entry| SuspendedWork {
                id: entry.id,
                name: entry.name.clone(),
                canceller: lock(&entry.canceller).clone(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.tasks).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
