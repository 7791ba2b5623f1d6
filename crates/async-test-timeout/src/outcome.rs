//! Translation of invocation results into test outcomes.

use crate::error::{ConfigurationError, TimeoutError, TimeoutFailure};
use std::fmt;
use std::io;

/// How a timed test ended, in test framework terms.
#[derive(Debug)]
pub enum TestOutcome<T, E> {
    /// The body returned a value in time.
    Passed(T),
    /// The body returned an error in time.
    Failed(E),
    /// The body exceeded its bound.
    TimedOut(TimeoutFailure),
    /// The timeout setting was malformed; the body never ran.
    InvalidConfiguration(ConfigurationError),
    /// The worker could not run the body.
    Aborted(io::Error),
}

/// The category of a [`TestOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The test passed.
    Passed,
    /// The test's own assertion or error failed it.
    Failed,
    /// The test ran out of time.
    TimedOut,
    /// The test could not be set up.
    Errored,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Passed => "passed",
            Verdict::Failed => "failed",
            Verdict::TimedOut => "timed out",
            Verdict::Errored => "errored",
        })
    }
}

impl<T, E> TestOutcome<T, E> {
    /// The category of this outcome.
    pub fn verdict(&self) -> Verdict {
        match self {
            TestOutcome::Passed(_) => Verdict::Passed,
            TestOutcome::Failed(_) => Verdict::Failed,
            TestOutcome::TimedOut(_) => Verdict::TimedOut,
            TestOutcome::InvalidConfiguration(_) | TestOutcome::Aborted(_) => Verdict::Errored,
        }
    }

    /// Returns true if the test passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed(_))
    }

    /// Converts back into a result, for returning from a `#[test]` fn.
    pub fn into_test_result(self) -> Result<T, TimeoutError<E>> {
        match self {
            TestOutcome::Passed(value) => Ok(value),
            TestOutcome::Failed(err) => Err(TimeoutError::Inner(err)),
            TestOutcome::TimedOut(failure) => Err(TimeoutError::Timeout(failure)),
            TestOutcome::InvalidConfiguration(err) => Err(TimeoutError::Configuration(err)),
            TestOutcome::Aborted(err) => Err(TimeoutError::Worker(err)),
        }
    }
}

impl<T, E> From<Result<T, TimeoutError<E>>> for TestOutcome<T, E> {
    fn from(result: Result<T, TimeoutError<E>>) -> Self {
        match result {
            Ok(value) => TestOutcome::Passed(value),
            Err(TimeoutError::Inner(err)) => TestOutcome::Failed(err),
            Err(TimeoutError::Timeout(failure)) => TestOutcome::TimedOut(failure),
            Err(TimeoutError::Configuration(err)) => TestOutcome::InvalidConfiguration(err),
            Err(TimeoutError::Worker(err)) => TestOutcome::Aborted(err),
        }
    }
}
