//! Method settings replace the class bound.

use super::class;
use async_test_timeout::{RecordingContext, TestOutcome, TimeoutSettings, run_blocking};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn longer_override_lets_slow_body_pass() {
    let class = class("PT1S");
    let method = TimeoutSettings::new("PT2S");
    let mut ctx = RecordingContext::new("takes_one_and_a_half()");

    let outcome = class.intercept(Some(&method), &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_millis(1500)))
    });

    assert!(outcome.is_passed());
}

#[test]
#[serial]
fn shorter_override_fails_body_within_class_bound() {
    let class = class("PT1S");
    let method = TimeoutSettings::new("PT0.5S");
    let mut ctx = RecordingContext::new("takes_point_eight()");

    let outcome = class.intercept(Some(&method), &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_millis(800)))
    });

    match outcome {
        TestOutcome::TimedOut(failure) => assert_eq!(failure.bound(), Duration::from_millis(500)),
        other => panic!("expected a timeout, got {}", other.verdict()),
    }
}

#[test]
#[serial]
fn override_applies_without_class_settings() {
    let class = super::untimed_class();
    let method = TimeoutSettings::new("PT0.2S");
    let mut ctx = RecordingContext::new("method_only()");

    let outcome = class.intercept(Some(&method), &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
}

#[test]
#[serial]
fn settings_loaded_from_json() {
    let class = class("PT5S");
    let method: TimeoutSettings =
        serde_json::from_str(r#"{"timeout": "PT0.2S", "cancel-on-timeout": true}"#).unwrap();
    assert!(method.cancel_on_timeout());
    let mut ctx = RecordingContext::new("configured_from_file()");

    let outcome = class.intercept(Some(&method), &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(30)))
    });

    match outcome {
        TestOutcome::TimedOut(failure) => assert_eq!(failure.bound(), Duration::from_millis(200)),
        other => panic!("expected a timeout, got {}", other.verdict()),
    }
}
