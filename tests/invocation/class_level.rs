//! A bound declared once for the whole class.

use super::class;
use async_test_timeout::{RecordingContext, RunError, TestOutcome, run_blocking};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn instant_body_passes() {
    let class = class("PT0.5S");
    let mut ctx = RecordingContext::new("instant()");

    let outcome = class.intercept(None, &mut ctx, || Ok::<_, RunError>(()));

    assert!(outcome.is_passed());
    assert!(ctx.entries().is_empty());
}

#[test]
#[serial]
fn async_body_within_bound_returns_value() {
    let class = class("PT0.5S");
    let mut ctx = RecordingContext::new("quick_async()");

    let outcome = class.intercept(None, &mut ctx, || {
        run_blocking(|| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "value"
        })
    });

    assert!(matches!(outcome, TestOutcome::Passed("value")));
}

#[test]
#[serial]
fn slow_body_times_out_with_class_bound() {
    let class = class("PT0.5S");
    let mut ctx = RecordingContext::new("slow()");

    let outcome = class.intercept(None, &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    match outcome {
        TestOutcome::TimedOut(failure) => {
            assert_eq!(failure.bound(), Duration::from_millis(500));
            assert_eq!(failure.to_string(), "slow() timed out after 500 ms");
        }
        other => panic!("expected a timeout, got {}", other.verdict()),
    }
}

#[test]
#[serial]
fn sibling_methods_share_the_class_bound() {
    let class = class("PT0.5S");

    let mut fast = RecordingContext::new("fast()");
    let first = class.intercept(None, &mut fast, || Ok::<_, RunError>(1));

    let mut slow = RecordingContext::new("slow()");
    let second = class.intercept(None, &mut slow, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    assert!(first.is_passed());
    assert!(matches!(second, TestOutcome::TimedOut(_)));
}
