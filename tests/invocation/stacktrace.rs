//! Task dumps and worker stacks reported on timeout.

use super::init_tracing;
use async_test_timeout::{
    CAPTURE_DUMP, DUMP_ENTRY_KEY, RecordingContext, RunError, TestOutcome, TimeoutExtension,
    TimeoutSettings, run_blocking, spawn, worker,
};
use serial_test::serial;
use std::time::Duration;

fn capturing(name: &str) -> RecordingContext {
    RecordingContext::new(name).with_parameter(CAPTURE_DUMP, "true")
}

fn timed_out_dump(settings: TimeoutSettings) -> String {
    init_tracing();
    let class = TimeoutExtension::new().before_all(None);
    let mut ctx = capturing("hangs()");

    let outcome = class.intercept(Some(&settings), &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    ctx.entry(DUMP_ENTRY_KEY)
        .expect("a dump should be published")
        .to_string()
}

#[test]
#[serial]
fn dump_names_suspended_task_and_creation_site() {
    let dump = timed_out_dump(TimeoutSettings::new("PT0.2S"));
    let lines: Vec<&str> = dump.lines().skip(2).collect();

    assert!(dump.starts_with("Tasks dump: "));
    assert!(lines[0].ends_with("SUSPENDED"), "status line: {:?}", lines[0]);
    assert!(lines[1].contains("stacktrace"), "creation line: {:?}", lines[1]);
}

#[test]
#[serial]
fn dump_omits_creation_site_when_disabled() {
    let settings = TimeoutSettings::builder("PT0.2S")
        .enable_creation_stack_traces(false)
        .build();
    let dump = timed_out_dump(settings);
    let lines: Vec<&str> = dump.lines().skip(2).collect();

    assert!(lines[0].ends_with("SUSPENDED"));
    assert!(!lines[1].contains("stacktrace"));
    assert!(!dump.contains("created at"));
}

#[test]
#[serial]
fn sanitized_dump_hides_runtime_frames() {
    let settings = TimeoutSettings::builder("PT0.2S")
        .sanitize_stack_traces(true)
        .build();
    let dump = timed_out_dump(settings);

    assert!(dump.contains("created at"));
    assert!(!dump.lines().any(|line| line.starts_with("\t\tat std::")));
    assert!(!dump.lines().any(|line| line.starts_with("\t\tat tokio::")));
}

#[test]
#[serial]
fn no_dump_published_without_suspended_work() {
    init_tracing();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.2S")));
    let mut ctx = capturing("blocks_thread()");

    let outcome = class.intercept(None, &mut ctx, || {
        worker::sleep(Duration::from_secs(2));
        Ok::<_, RunError>(())
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    assert!(ctx.entry(DUMP_ENTRY_KEY).is_none());
    assert!(ctx.entries().is_empty());
}

#[test]
#[serial]
fn no_dump_published_without_capture_parameter() {
    init_tracing();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.2S")));
    let mut ctx = RecordingContext::new("to_stderr()");

    let outcome = class.intercept(None, &mut ctx, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    assert!(ctx.entries().is_empty());
}

#[test]
#[serial]
fn failure_stack_is_the_workers() {
    init_tracing();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.3S")));
    let mut ctx = RecordingContext::new("nested()");

    let outcome = class.intercept(None, &mut ctx, || {
        run_blocking(|| async {
            let reader = spawn("reader", tokio::time::sleep(Duration::from_secs(2)));
            let _ = reader.await;
        })
    });

    let failure = match outcome {
        TestOutcome::TimedOut(failure) => failure,
        other => panic!("expected a timeout, got {}", other.verdict()),
    };
    let names: Vec<&str> = failure
        .stack_trace()
        .iter()
        .map(|frame| frame.function.as_str())
        .collect();
    assert_eq!(names, vec!["reader", "run_blocking", "<test body>"]);

    let entry = failure.stack_trace().last().unwrap();
    assert!(entry.location.as_deref().unwrap().contains("stacktrace.rs"));
    assert!(format!("{:#}", failure).contains("\tat reader"));
}
