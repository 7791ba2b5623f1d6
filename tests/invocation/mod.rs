//! Timed invocations through the class/method extension.

pub mod cancellation;
pub mod class_level;
pub mod method_level;
pub mod parse_error;
pub mod stacktrace;

use async_test_timeout::{ClassScope, TimeoutExtension, TimeoutSettings};
use std::sync::Once;
use tracing_subscriber::filter::LevelFilter;

static TRACING: Once = Once::new();

/// Routes library logs through the test writer.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(LevelFilter::DEBUG)
            .try_init();
    });
}

/// A class scope with the given class-level timeout.
pub fn class(timeout: &str) -> ClassScope {
    init_tracing();
    TimeoutExtension::new().before_all(Some(TimeoutSettings::new(timeout)))
}

/// A class scope without class-level settings.
pub fn untimed_class() -> ClassScope {
    init_tracing();
    TimeoutExtension::new().before_all(None)
}
