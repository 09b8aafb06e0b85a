mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use piscan::aggregate::ReportPolicy;
use support::{options, request, scanner, Answer, FakeExecutor, FakeProbe};
use tokio::time;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_stops_dispatch_and_returns_promptly() {
    let probe = Arc::new(FakeProbe::new().delay(Duration::from_millis(100)));
    let executor = Arc::new(FakeExecutor::new());
    let mut opts = options(50);
    opts.timeouts.probe = Duration::from_secs(1);

    let scanner = scanner(request("10.20.0.0/22", "", &[]), opts, &probe, &executor);
    let cancel = scanner.cancellation_token();

    let probe_at_cancel = Arc::clone(&probe);
    let trigger = tokio::spawn(async move {
        time::sleep(Duration::from_millis(250)).await;
        let probed = probe_at_cancel.probed();
        cancel.cancel();
        (probed, Instant::now())
    });

    let result = scanner.run().await;
    let returned = Instant::now();
    let (probed_at_cancel, cancelled_at) = trigger.await.unwrap();

    assert!(returned.duration_since(cancelled_at) < Duration::from_secs(2));
    assert!(probe.probed() <= probed_at_cancel + 50);
    assert!(probe.probed() < 1022);
    assert!(result.nodes.is_empty());
    assert!(result.tally.cancelled > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_releases_open_sessions() {
    let probe = Arc::new(FakeProbe::new().all_up("raspberrypi"));
    let executor = Arc::new(
        FakeExecutor::new()
            .otherwise(Answer::Accept)
            .exec_delay(Duration::from_secs(3600)),
    );
    let mut opts = options(20);
    opts.timeouts.exec = Duration::from_secs(60);
    opts.policy = ReportPolicy::IncludeFailed;

    let scanner = scanner(request("10.0.0.0/24", "", &[]), opts, &probe, &executor);
    let cancel = scanner.cancellation_token();
    tokio::spawn(async move {
        time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let result = scanner.run().await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(executor.opened() > 0);
    assert_eq!(executor.open_sessions(), 0);
    // Cancelled hosts never show up, whatever the policy.
    assert!(result.nodes.is_empty());
    assert!(result.tally.cancelled >= executor.opened());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_ends_the_run() {
    let probe = Arc::new(FakeProbe::new().delay(Duration::from_millis(100)));
    let executor = Arc::new(FakeExecutor::new());
    let mut opts = options(10);
    opts.timeouts.probe = Duration::from_secs(1);
    opts.deadline = Some(Duration::from_millis(300));

    let scanner = scanner(request("10.20.0.0/22", "", &[]), opts, &probe, &executor);
    let start = Instant::now();
    let result = scanner.run().await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(scanner.cancellation_token().is_cancelled());
    assert!(result.tally.total() < 1022);
    assert!(probe.probed() < 1022);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_longer_than_the_run_changes_nothing() {
    let probe = Arc::new(FakeProbe::new().host("10.0.0.2", "raspberrypi"));
    let executor = Arc::new(FakeExecutor::new().otherwise(Answer::Accept));
    let mut opts = options(8);
    opts.deadline = Some(Duration::from_secs(60));

    let scanner = scanner(request("10.0.0.0/29", "", &[]), opts, &probe, &executor);
    let result = scanner.run().await;

    assert!(!scanner.cancellation_token().is_cancelled());
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.tally.cancelled, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_never_exceeds_batch_size() {
    let probe = Arc::new(FakeProbe::new().delay(Duration::from_millis(20)));
    let executor = Arc::new(FakeExecutor::new());

    let result = scanner(request("10.0.0.0/24", "", &[]), options(7), &probe, &executor)
        .run()
        .await;

    assert_eq!(result.tally.total(), 254);
    assert_eq!(probe.probed(), 254);
    assert!(probe.peak() <= 7);
}
