//! Timeout settings and their resolution into a per-invocation config.

use crate::duration::parse_duration;
use crate::error::ConfigurationError;
use async_test_timeout_probes::ProbeOptions;
use std::time::Duration;

/// Timeout settings attached to a test class or a test method.
///
/// The duration is kept as written and only parsed when the settings are
/// resolved, so a malformed value fails the invocation that uses it rather
/// than the code that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct TimeoutSettings {
    pub(crate) timeout: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) cancel_on_timeout: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub(crate) enable_creation_stack_traces: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) sanitize_stack_traces: bool,
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

impl TimeoutSettings {
    /// Settings with the given ISO-8601 duration and default flags.
    pub fn new(timeout: impl Into<String>) -> Self {
        Self::builder(timeout).build()
    }

    /// Creates a new settings builder.
    pub fn builder(timeout: impl Into<String>) -> TimeoutSettingsBuilder {
        TimeoutSettingsBuilder::new(timeout)
    }

    /// The duration as written.
    pub fn timeout(&self) -> &str {
        &self.timeout
    }

    /// Whether suspended work is cancelled on timeout.
    pub fn cancel_on_timeout(&self) -> bool {
        self.cancel_on_timeout
    }

    /// Whether task creation stacks are captured.
    pub fn enable_creation_stack_traces(&self) -> bool {
        self.enable_creation_stack_traces
    }

    /// Whether creation stacks are sanitized.
    pub fn sanitize_stack_traces(&self) -> bool {
        self.sanitize_stack_traces
    }
}

/// Builder for [`TimeoutSettings`].
pub struct TimeoutSettingsBuilder {
    timeout: String,
    cancel_on_timeout: bool,
    enable_creation_stack_traces: bool,
    sanitize_stack_traces: bool,
}

impl TimeoutSettingsBuilder {
    /// Creates a new builder with default values.
    pub fn new(timeout: impl Into<String>) -> Self {
        Self {
            timeout: timeout.into(),
            cancel_on_timeout: false,
            enable_creation_stack_traces: true,
            sanitize_stack_traces: false,
        }
    }

    /// Sets whether suspended work is cancelled when the bound is exceeded.
    ///
    /// Cancellation happens after the task dump has been taken.
    ///
    /// Default: false
    pub fn cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    /// Sets whether each tracked task records where it was created.
    ///
    /// Default: true
    pub fn enable_creation_stack_traces(mut self, enabled: bool) -> Self {
        self.enable_creation_stack_traces = enabled;
        self
    }

    /// Sets whether runtime frames are stripped from creation stacks.
    ///
    /// Default: false
    pub fn sanitize_stack_traces(mut self, enabled: bool) -> Self {
        self.sanitize_stack_traces = enabled;
        self
    }

    /// Builds the settings.
    pub fn build(self) -> TimeoutSettings {
        TimeoutSettings {
            timeout: self.timeout,
            cancel_on_timeout: self.cancel_on_timeout,
            enable_creation_stack_traces: self.enable_creation_stack_traces,
            sanitize_stack_traces: self.sanitize_stack_traces,
        }
    }
}

/// The resolved timeout of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    duration: Duration,
    cancel_on_timeout: bool,
    capture_creation_site: bool,
    sanitize_traces: bool,
}

impl TimeoutConfig {
    /// A config with the given bound and default flags.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            cancel_on_timeout: false,
            capture_creation_site: true,
            sanitize_traces: false,
        }
    }

    /// Sets whether suspended work is cancelled on timeout.
    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    /// Sets whether task creation sites are captured.
    pub fn with_capture_creation_site(mut self, capture: bool) -> Self {
        self.capture_creation_site = capture;
        self
    }

    /// Sets whether creation stacks are sanitized.
    pub fn with_sanitize_traces(mut self, sanitize: bool) -> Self {
        self.sanitize_traces = sanitize;
        self
    }

    /// Parses settings into a config.
    pub fn from_settings(settings: &TimeoutSettings) -> Result<Self, ConfigurationError> {
        let duration = parse_duration(&settings.timeout)
            .map_err(|err| ConfigurationError::new(settings.timeout.clone(), err))?;

        Ok(Self {
            duration,
            cancel_on_timeout: settings.cancel_on_timeout,
            capture_creation_site: settings.enable_creation_stack_traces,
            sanitize_traces: settings.sanitize_stack_traces,
        })
    }

    /// Picks the settings that apply to one invocation.
    ///
    /// Method settings, when present, replace class settings entirely; no
    /// field is inherited from the class. `Ok(None)` means neither scope
    /// declares a timeout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use async_test_timeout::{TimeoutConfig, TimeoutSettings};
    /// use std::time::Duration;
    ///
    /// let class = TimeoutSettings::builder("PT1S").cancel_on_timeout(true).build();
    /// let method = TimeoutSettings::new("PT2S");
    ///
    /// let config = TimeoutConfig::resolve(Some(&class), Some(&method)).unwrap().unwrap();
    /// assert_eq!(config.duration(), Duration::from_secs(2));
    /// assert!(!config.cancel_on_timeout());
    /// ```
    pub fn resolve(
        class: Option<&TimeoutSettings>,
        method: Option<&TimeoutSettings>,
    ) -> Result<Option<Self>, ConfigurationError> {
        method.or(class).map(Self::from_settings).transpose()
    }

    /// The bound.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether suspended work is cancelled on timeout.
    pub fn cancel_on_timeout(&self) -> bool {
        self.cancel_on_timeout
    }

    /// Whether task creation sites are captured.
    pub fn capture_creation_site(&self) -> bool {
        self.capture_creation_site
    }

    /// Whether creation stacks are sanitized.
    pub fn sanitize_traces(&self) -> bool {
        self.sanitize_traces
    }

    /// Probe options matching this config.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions::new()
            .with_creation_stack_traces(self.capture_creation_site)
            .with_sanitize_stack_traces(self.sanitize_traces)
    }
}
