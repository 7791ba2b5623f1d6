//! Malformed durations fail the test before the body runs.

use super::class;
use async_test_timeout::{
    RecordingContext, RunError, TestOutcome, TimeoutConfig, TimeoutError, TimeoutSettings,
    Verdict, run_with_timeout,
};
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
#[serial]
fn junk_class_duration_is_a_configuration_error() {
    let class = class("junk");
    let ran = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&ran);
    let mut ctx = RecordingContext::new("junk_class()");

    let outcome = class.intercept(None, &mut ctx, move || {
        r.store(true, Ordering::SeqCst);
        Ok::<_, RunError>(())
    });

    match outcome {
        TestOutcome::InvalidConfiguration(err) => {
            assert_eq!(err.input(), "junk");
            assert_eq!(err.to_string(), "junk cannot be parsed to a duration");
        }
        other => panic!("expected a configuration error, got {}", other.verdict()),
    }
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
#[serial]
fn junk_method_duration_wins_over_valid_class() {
    let class = class("PT1S");
    let method = TimeoutSettings::new("junk");
    let mut ctx = RecordingContext::new("junk_method()");

    let outcome = class.intercept(Some(&method), &mut ctx, || Ok::<_, RunError>(()));

    assert_eq!(outcome.verdict(), Verdict::Errored);
}

#[test]
#[serial]
fn configuration_error_independent_of_body() {
    let class = class("P");

    for slow in [false, true] {
        let mut ctx = RecordingContext::new("any_body()");
        let outcome = class.intercept(None, &mut ctx, move || {
            if slow {
                async_test_timeout::worker::sleep(std::time::Duration::from_secs(5));
            }
            Err::<(), _>("body ran")
        });
        assert!(matches!(outcome, TestOutcome::InvalidConfiguration(_)));
    }
}

#[test]
#[serial]
fn resolved_error_converts_into_timeout_error() {
    let settings = TimeoutSettings::new("PT-1S");
    let err = TimeoutConfig::from_settings(&settings).unwrap_err();

    let result: Result<(), TimeoutError<RunError>> = Err(err.into());
    assert!(result.unwrap_err().is_configuration());

    // A valid config still runs through the free function.
    let mut ctx = RecordingContext::new("valid()");
    let config = TimeoutConfig::from_settings(&TimeoutSettings::new("PT1S")).unwrap();
    let value = run_with_timeout(|| Ok::<_, RunError>(5), &config, &mut ctx).unwrap();
    assert_eq!(value, 5);
}
