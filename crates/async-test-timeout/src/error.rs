//! Error types for timed invocations.

use crate::duration::DurationParseError;
use std::fmt;
use std::io;
use std::panic::Location;
use std::time::Duration;
use thiserror::Error;

/// A timeout setting that could not be turned into a bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input} cannot be parsed to a duration")]
pub struct ConfigurationError {
    input: String,
    #[source]
    source: DurationParseError,
}

impl ConfigurationError {
    pub(crate) fn new(input: impl Into<String>, source: DurationParseError) -> Self {
        Self {
            input: input.into(),
            source,
        }
    }

    /// The rejected duration string.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Why the string was rejected.
    pub fn parse_error(&self) -> &DurationParseError {
        &self.source
    }
}

/// One entry of a worker stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Task or function name.
    pub function: String,
    /// `file:line:column` of the frame, if known.
    pub location: Option<String>,
}

impl StackFrame {
    pub(crate) fn entry(location: &'static Location<'static>) -> Self {
        Self {
            function: "<test body>".to_string(),
            location: Some(location.to_string()),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({})", self.function, location),
            None => f.write_str(&self.function),
        }
    }
}

/// The failure reported when a test body exceeds its bound.
///
/// Its stack is the worker's: the tasks that were live on the worker
/// thread, innermost first, ending at the body's entry site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutFailure {
    name: String,
    bound: Duration,
    stack: Vec<StackFrame>,
}

impl TimeoutFailure {
    pub(crate) fn new(name: impl Into<String>, bound: Duration, stack: Vec<StackFrame>) -> Self {
        Self {
            name: name.into(),
            bound,
            stack,
        }
    }

    /// Display name of the test that timed out.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured bound.
    pub fn bound(&self) -> Duration {
        self.bound
    }

    /// The worker's stack, innermost first.
    pub fn stack_trace(&self) -> &[StackFrame] {
        &self.stack
    }
}

impl fmt::Display for TimeoutFailure {
    /// `{:#}` also prints the worker stack.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} timed out after {} ms", self.name, self.bound.as_millis())?;
        if f.alternate() {
            for frame in &self.stack {
                write!(f, "\n\tat {}", frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for TimeoutFailure {}

/// Errors returned by a timed invocation.
#[derive(Debug)]
pub enum TimeoutError<E> {
    /// The timeout setting was malformed; the body never ran.
    Configuration(ConfigurationError),
    /// The body did not finish within its bound.
    Timeout(TimeoutFailure),
    /// The body finished in time with an error.
    Inner(E),
    /// The worker could not be started or disappeared without reporting.
    Worker(io::Error),
}

impl<E> fmt::Display for TimeoutError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutError::Configuration(err) => write!(f, "invalid timeout configuration: {}", err),
            TimeoutError::Timeout(failure) => write!(f, "{}", failure),
            TimeoutError::Inner(err) => write!(f, "test body failed: {}", err),
            TimeoutError::Worker(err) => write!(f, "timeout worker failed: {}", err),
        }
    }
}

impl<E> std::error::Error for TimeoutError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeoutError::Configuration(err) => Some(err),
            TimeoutError::Timeout(failure) => Some(failure),
            TimeoutError::Inner(err) => Some(err),
            TimeoutError::Worker(err) => Some(err),
        }
    }
}

impl<E> TimeoutError<E> {
    /// Returns true if the body exceeded its bound.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout(_))
    }

    /// Returns true if the timeout setting was malformed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, TimeoutError::Configuration(_))
    }

    /// Returns the body's own error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeoutError::Inner(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the timeout failure, if that is what this is.
    pub fn timeout_failure(&self) -> Option<&TimeoutFailure> {
        match self {
            TimeoutError::Timeout(failure) => Some(failure),
            _ => None,
        }
    }
}

impl<E> From<ConfigurationError> for TimeoutError<E> {
    fn from(err: ConfigurationError) -> Self {
        TimeoutError::Configuration(err)
    }
}
