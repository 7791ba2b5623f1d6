//! Property tests for class/method resolution.
//!
//! Invariants tested:
//! - Method settings win whenever present
//! - Class settings apply only when the method has none
//! - Nothing resolves to no timeout

use async_test_timeout::{TimeoutConfig, TimeoutSettings};
use proptest::prelude::*;
use std::time::Duration;

fn settings(millis: u64, cancel: bool, capture: bool, sanitize: bool) -> TimeoutSettings {
    TimeoutSettings::builder(format!("PT{}.{:03}S", millis / 1000, millis % 1000))
        .cancel_on_timeout(cancel)
        .enable_creation_stack_traces(capture)
        .sanitize_stack_traces(sanitize)
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: method settings always win, longer or shorter
    #[test]
    fn method_settings_always_win(
        class_millis in 0u64..100_000,
        method_millis in 0u64..100_000,
        class_flags in any::<(bool, bool, bool)>(),
        method_flags in any::<(bool, bool, bool)>(),
    ) {
        let class = settings(class_millis, class_flags.0, class_flags.1, class_flags.2);
        let method = settings(method_millis, method_flags.0, method_flags.1, method_flags.2);

        let config = TimeoutConfig::resolve(Some(&class), Some(&method)).unwrap().unwrap();

        prop_assert_eq!(config.duration(), Duration::from_millis(method_millis));
        prop_assert_eq!(config.cancel_on_timeout(), method_flags.0);
        prop_assert_eq!(config.capture_creation_site(), method_flags.1);
        prop_assert_eq!(config.sanitize_traces(), method_flags.2);
    }

    /// Property: class settings apply when the method declares none
    #[test]
    fn class_settings_apply_without_method(
        class_millis in 0u64..100_000,
        cancel in any::<bool>(),
    ) {
        let class = settings(class_millis, cancel, true, false);

        let config = TimeoutConfig::resolve(Some(&class), None).unwrap().unwrap();

        prop_assert_eq!(config.duration(), Duration::from_millis(class_millis));
        prop_assert_eq!(config.cancel_on_timeout(), cancel);
    }

    /// Property: a malformed method duration is an error even under a valid class
    #[test]
    fn malformed_method_never_falls_back(
        class_millis in 0u64..100_000,
        junk in "[a-zA-Z ]{1,12}",
    ) {
        let class = settings(class_millis, false, true, false);
        let method = TimeoutSettings::new(junk.clone());

        let err = TimeoutConfig::resolve(Some(&class), Some(&method)).unwrap_err();
        prop_assert_eq!(err.input(), junk.as_str());
    }
}

#[test]
fn no_settings_means_no_timeout() {
    assert_eq!(TimeoutConfig::resolve(None, None), Ok(None));
}
