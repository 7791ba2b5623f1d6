//! The host test framework's side of an invocation.

use std::collections::HashMap;
use std::io::{self, Write};
use thiserror::Error;

/// Configuration parameter that routes task dumps into a report entry.
///
/// Its presence is what matters; the value is ignored.
pub const CAPTURE_DUMP: &str = "async_test_timeout.capture-dump";

/// Report entry key under which a captured task dump is published.
pub const DUMP_ENTRY_KEY: &str = "dump";

/// Errors raised while publishing a report entry.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report entries must have a value.
    #[error("report entry {key:?} has an empty value")]
    EmptyValue {
        /// The entry key.
        key: String,
    },
    /// Report entries must have a non-blank key.
    #[error("report entry key is blank")]
    BlankKey,
    /// The entry could not be written out.
    #[error("failed to write report entry: {0}")]
    Write(#[source] io::Error),
}

/// What an invocation needs from the test framework.
pub trait TestContext {
    /// Human-readable name of the running test.
    fn display_name(&self) -> &str;

    /// Looks up a framework configuration parameter.
    fn configuration_parameter(&self, key: &str) -> Option<String>;

    /// Attaches a key/value artifact to the test's report.
    fn publish_report_entry(&mut self, key: &str, value: &str) -> Result<(), ReportError>;
}

fn validate(key: &str, value: &str) -> Result<(), ReportError> {
    if key.trim().is_empty() {
        return Err(ReportError::BlankKey);
    }
    if value.is_empty() {
        return Err(ReportError::EmptyValue {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// A published report entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: String,
}

/// An in-memory context that records published entries.
///
/// # Examples
///
/// ```rust
/// use async_test_timeout::{RecordingContext, TestContext, CAPTURE_DUMP};
///
/// let mut ctx = RecordingContext::new("slow_test()").with_parameter(CAPTURE_DUMP, "true");
/// assert!(ctx.configuration_parameter(CAPTURE_DUMP).is_some());
///
/// ctx.publish_report_entry("dump", "Tasks dump: ...").unwrap();
/// assert_eq!(ctx.entry("dump"), Some("Tasks dump: ..."));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingContext {
    name: String,
    parameters: HashMap<String, String>,
    entries: Vec<ReportEntry>,
}

impl RecordingContext {
    /// Creates a context for the named test.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a configuration parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// All entries published so far, in order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// The most recent value published under `key`.
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }
}

impl TestContext for RecordingContext {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn configuration_parameter(&self, key: &str) -> Option<String> {
        self.parameters.get(key).cloned()
    }

    fn publish_report_entry(&mut self, key: &str, value: &str) -> Result<(), ReportError> {
        validate(key, value)?;
        self.entries.push(ReportEntry {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

/// A context backed by the process environment.
///
/// Parameter `a.b-c` is read from the variable `A_B_C`, so
/// [`CAPTURE_DUMP`] maps to `ASYNC_TEST_TIMEOUT_CAPTURE_DUMP`. Report
/// entries are written to stderr.
#[derive(Debug, Clone)]
pub struct EnvContext {
    name: String,
}

impl EnvContext {
    /// Creates a context for the named test.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The environment variable a parameter is read from.
    pub fn env_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl TestContext for EnvContext {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn configuration_parameter(&self, key: &str) -> Option<String> {
        std::env::var(Self::env_key(key)).ok()
    }

    fn publish_report_entry(&mut self, key: &str, value: &str) -> Result<(), ReportError> {
        validate(key, value)?;
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "[{}] report entry {}:", self.name, key)
            .and_then(|_| stderr.write_all(value.as_bytes()))
            .and_then(|_| stderr.flush())
            .map_err(ReportError::Write)
    }
}
