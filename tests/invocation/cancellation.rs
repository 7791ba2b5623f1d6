//! What happens to the worker and its tasks after a timeout.

use super::init_tracing;
use async_test_timeout::{
    CAPTURE_DUMP, Coordinator, DUMP_ENTRY_KEY, RecordingContext, RunError, TestOutcome,
    TimeoutExtension, TimeoutSettings, run_blocking, spawn, worker,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

#[test]
#[serial]
fn cancel_on_timeout_stops_blocking_root() {
    init_tracing();
    let (tx, rx) = mpsc::channel();
    let class = TimeoutExtension::new().before_all(None);
    let method = TimeoutSettings::builder("PT0.2S").cancel_on_timeout(true).build();
    let mut ctx = RecordingContext::new("cancelled()");

    let outcome = class.intercept(Some(&method), &mut ctx, move || {
        let result = run_blocking(|| tokio::time::sleep(Duration::from_secs(30)));
        let _ = tx.send(result.as_ref().map_err(RunError::is_cancelled).copied());
        result
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    let reported = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(reported, Err(true));
}

#[test]
#[serial]
fn timeout_interrupts_blocking_work_without_cancel() {
    init_tracing();
    let (tx, rx) = mpsc::channel();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.1S")));
    let mut ctx = RecordingContext::new("not_cancelled()");

    let outcome = class.intercept(None, &mut ctx, move || {
        let result = run_blocking(|| tokio::time::sleep(Duration::from_secs(30)));
        let _ = tx.send(result.as_ref().map_err(RunError::is_interrupted).copied());
        result
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    let reported = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(reported, Err(true));
}

#[test]
#[serial]
fn timed_out_body_does_not_leak_into_next_dump() {
    init_tracing();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.1S")));
    let mut first = RecordingContext::new("first()");

    let outcome = class.intercept(None, &mut first, || {
        run_blocking(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let late = spawn("late-child", tokio::time::sleep(Duration::from_secs(30)));
            let _ = late.await;
        })
    });
    assert!(matches!(outcome, TestOutcome::TimedOut(_)));

    let method = TimeoutSettings::new("PT0.4S");
    let mut second = RecordingContext::new("second()").with_parameter(CAPTURE_DUMP, "true");
    let outcome = class.intercept(Some(&method), &mut second, || {
        run_blocking(|| tokio::time::sleep(Duration::from_secs(2)))
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    let dump = second.entry(DUMP_ENTRY_KEY).expect("second test parks a task");
    assert!(dump.contains("second()"));
    assert!(!dump.contains("late-child"), "leaked task in dump:\n{dump}");
    assert!(!dump.contains("first()"), "leaked task in dump:\n{dump}");
}

#[test]
#[serial]
fn cancellation_reaches_spawned_tasks() {
    init_tracing();
    let cancelled = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&cancelled);
    let coordinator = Coordinator::builder()
        .name("cancelling")
        .on_cancelled(move |ok, failed| {
            assert_eq!(failed, 0);
            c.fetch_add(ok, Ordering::SeqCst);
        })
        .build();

    let class = TimeoutExtension::with_coordinator(Arc::new(coordinator)).before_all(None);
    let method = TimeoutSettings::builder("PT0.3S").cancel_on_timeout(true).build();
    let mut ctx = RecordingContext::new("spawns_children()");

    let outcome = class.intercept(Some(&method), &mut ctx, || {
        run_blocking(|| async {
            let a = spawn("child-a", tokio::time::sleep(Duration::from_secs(30)));
            let b = spawn("child-b", tokio::time::sleep(Duration::from_secs(30)));
            let _ = tokio::join!(a, b);
        })
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    // The root and both children were parked.
    assert_eq!(cancelled.load(Ordering::SeqCst), 3);
}

#[test]
#[serial]
fn worker_observes_interrupt() {
    init_tracing();
    let (tx, rx) = mpsc::channel();
    let class = TimeoutExtension::new().before_all(Some(TimeoutSettings::new("PT0.1S")));
    let mut ctx = RecordingContext::new("busy_loop()");

    let outcome = class.intercept(None, &mut ctx, move || {
        while !worker::is_interrupted() {
            std::thread::sleep(Duration::from_millis(5));
        }
        let _ = tx.send(());
        Ok::<_, RunError>(())
    });

    assert!(matches!(outcome, TestOutcome::TimedOut(_)));
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
}
