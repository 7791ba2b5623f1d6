//! Two-phase registration: class scope first, then one interception per
//! test method.

use crate::config::{TimeoutConfig, TimeoutSettings};
use crate::coordinator::Coordinator;
use crate::outcome::TestOutcome;
use crate::report::TestContext;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Entry point for a test harness.
///
/// # Examples
///
/// ```rust
/// use async_test_timeout::{RecordingContext, TimeoutExtension, TimeoutSettings};
///
/// let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT5S")));
///
/// let mut ctx = RecordingContext::new("adds_numbers()");
/// let outcome = class.intercept(None, &mut ctx, || Ok::<_, String>(1 + 1));
/// assert!(outcome.is_passed());
/// ```
#[derive(Clone)]
pub struct TimeoutExtension {
    coordinator: Arc<Coordinator>,
}

impl TimeoutExtension {
    /// An extension using a default [`Coordinator`].
    pub fn new() -> Self {
        Self::with_coordinator(Arc::new(Coordinator::new()))
    }

    /// An extension using the given coordinator.
    pub fn with_coordinator(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Opens a class scope with the class-level settings, if any.
    pub fn before_all(&self, class: Option<TimeoutSettings>) -> ClassScope {
        ClassScope {
            coordinator: Arc::clone(&self.coordinator),
            class,
        }
    }
}

impl Default for TimeoutExtension {
    fn default() -> Self {
        Self::new()
    }
}

/// Class-level state shared by the methods of one test class.
pub struct ClassScope {
    coordinator: Arc<Coordinator>,
    class: Option<TimeoutSettings>,
}

impl ClassScope {
    /// The class-level settings.
    pub fn class_settings(&self) -> Option<&TimeoutSettings> {
        self.class.as_ref()
    }

    /// Runs one test method.
    ///
    /// Method settings replace the class settings when present. With no
    /// settings at all the body runs directly on the calling thread. A
    /// malformed duration fails the method without running the body.
    #[track_caller]
    pub fn intercept<T, E, F>(
        &self,
        method: Option<&TimeoutSettings>,
        ctx: &mut dyn TestContext,
        body: F,
    ) -> TestOutcome<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        match TimeoutConfig::resolve(self.class.as_ref(), method) {
            Ok(Some(config)) => self.coordinator.run(body, &config, ctx).into(),
            Ok(None) => {
                #[cfg(feature = "tracing")]
                debug!(invocation = %ctx.display_name(), "No timeout configured; running body directly");

                match body() {
                    Ok(value) => TestOutcome::Passed(value),
                    Err(err) => TestOutcome::Failed(err),
                }
            }
            Err(err) => TestOutcome::InvalidConfiguration(err),
        }
    }
}
