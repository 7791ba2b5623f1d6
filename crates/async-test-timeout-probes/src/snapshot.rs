//! Point-in-time task dumps.

use crate::registry::TaskState;
use std::backtrace::Backtrace;
use std::io::{self, Write};
use std::thread::ThreadId;

/// Symbol prefixes hidden from sanitized creation stacks.
const INTERNAL_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "test::",
    "async_test_timeout_probes::",
    "async_test_timeout::",
    "__rust",
    "__libc",
    "_start",
    "start_thread",
    "clone",
];

/// One frame of a captured stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled symbol name.
    pub symbol: String,
    /// Source location, when debug info is available.
    pub location: Option<String>,
}

/// Where and how a task was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationSite {
    /// `file:line:column` of the call that created the task.
    pub location: String,
    /// Stack captured at creation, outermost frame last.
    pub frames: Vec<Frame>,
}

/// A tracked task as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Registry-assigned id, increasing in creation order.
    pub id: u64,
    /// Task name.
    pub name: String,
    /// State at snapshot time.
    pub state: TaskState,
    /// Thread the task was created on.
    pub thread_id: ThreadId,
    /// Name of that thread, if it had one.
    pub thread_name: Option<String>,
    /// Creation site, present when creation stacks were enabled.
    pub creation: Option<CreationSite>,
}

/// An ordered, immutable listing of tracked tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticSnapshot {
    tasks: Vec<TaskSnapshot>,
}

impl DiagnosticSnapshot {
    /// Creates a snapshot from task records in creation order.
    pub fn new(tasks: Vec<TaskSnapshot>) -> Self {
        Self { tasks }
    }

    /// All tasks, in creation order.
    pub fn tasks(&self) -> &[TaskSnapshot] {
        &self.tasks
    }

    /// Tasks created on the given thread, in creation order.
    pub fn tasks_on(&self, thread: ThreadId) -> impl DoubleEndedIterator<Item = &TaskSnapshot> {
        self.tasks.iter().filter(move |task| task.thread_id == thread)
    }

    /// Returns true if no tasks were tracked.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Writes the dump in its text form.
    ///
    /// The output starts with a header line and a blank line. Each task then
    /// gets a status line ending in its state token, followed, when creation
    /// stacks were captured, by a `created at` line and the creation frames.
    /// Records are separated by blank lines. An empty snapshot writes
    /// nothing.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        writeln!(out, "Tasks dump: {} task(s) tracked", self.tasks.len())?;
        writeln!(out)?;

        for task in &self.tasks {
            let thread = match &task.thread_name {
                Some(name) => format!("thread '{}'", name),
                None => format!("thread {:?}", task.thread_id),
            };
            writeln!(
                out,
                "Task \"{}\" #{} on {}, state: {}",
                task.name, task.id, thread, task.state
            )?;

            if let Some(creation) = &task.creation {
                writeln!(out, "\tcreated at {}", creation.location)?;
                for frame in &creation.frames {
                    match &frame.location {
                        Some(location) => writeln!(out, "\t\tat {} ({})", frame.symbol, location)?,
                        None => writeln!(out, "\t\tat {}", frame.symbol)?,
                    }
                }
            }
            writeln!(out)?;
        }

        Ok(())
    }

    /// Renders the dump into a string.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Splits a captured backtrace into frames.
///
/// Relies on the standard `Display` layout: a `N: symbol` line per frame,
/// optionally followed by `at file:line:col` lines.
pub(crate) fn parse_frames(backtrace: &Backtrace) -> Vec<Frame> {
    let rendered = backtrace.to_string();
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.location.is_none() {
                    frame.location = Some(location.to_string());
                }
            }
            continue;
        }

        if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(Frame {
                    symbol: symbol.to_string(),
                    location: None,
                });
            }
        }
    }

    frames
}

/// Drops frames belonging to the standard library, the runtime and the probes.
pub(crate) fn sanitize_frames(frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .filter(|frame| !is_internal(&frame.symbol))
        .collect()
}

fn is_internal(symbol: &str) -> bool {
    let trimmed = symbol.trim_start_matches('<');
    INTERNAL_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
        || symbol.contains(" as core::")
        || symbol.contains(" as std::")
}
