//! Full runs against the loopback service on a paused clock.

use authprobe::config::HarnessConfig;
use authprobe::report::{RecordingReportSink, Report, RunLedger};
use authprobe::scenarios::{self, Harness, ShutdownRequested};
use authprobe::test_utils::init_test_logging;
use authprobe::{IdentityService, LoopbackIdentity, RuntimePump};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn harness(
    token: CancellationToken,
) -> (Harness<RuntimePump>, Arc<RecordingReportSink>, LoopbackIdentity) {
    init_test_logging();
    let sink = Arc::new(RecordingReportSink::new());
    let service = LoopbackIdentity::new(Duration::from_millis(150));
    let harness = Harness::new(
        RuntimePump::new(token),
        sink.clone(),
        Arc::new(service.clone()),
        &HarnessConfig::default(),
    );
    (harness, sink, service)
}

#[tokio::test(start_paused = true)]
async fn test_full_run_has_no_failures() {
    let (mut h, sink, service) = harness(CancellationToken::new());

    assert_eq!(scenarios::run_all(&mut h).await, Ok(()));

    let failures: Vec<String> = sink.failures().iter().map(ToString::to_string).collect();
    assert!(failures.is_empty(), "unexpected failures: {failures:#?}");
    assert!(sink.count(|r| matches!(r, Report::CounterVerified { .. })) >= 10);
    assert!(sink.count(|r| matches!(r, Report::CompletedAsExpected { .. })) >= 15);
    // Left signed in for the next run; listeners were removed.
    assert!(service.current_session().is_some());
    assert_eq!(service.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_signs_out_previous_session() {
    let (mut h, sink, service) = harness(CancellationToken::new());
    scenarios::final_sign_in(&mut h).await.unwrap();
    let previous = service.current_session().unwrap();
    sink.clear();

    scenarios::sign_out_previous(&mut h).await.unwrap();

    assert_eq!(service.current_session(), None);
    let notes = sink.count(|r| {
        matches!(r, Report::Note { message } if message.contains(&previous.to_string()))
    });
    assert_eq!(notes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_the_run() {
    let token = CancellationToken::new();
    let (mut h, sink, _service) = harness(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        canceller.cancel();
    });

    assert_eq!(scenarios::run_all(&mut h).await, Err(ShutdownRequested));
    let reached_exit = sink.count(|r| {
        matches!(r, Report::Calling { label } if label == "SignInAnonymously() at exit")
    });
    assert_eq!(reached_exit, 0);
    let finished = sink.count(|r| {
        matches!(r, Report::Note { message } if message == "All scenarios finished")
    });
    assert_eq!(finished, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_summary_for_clean_run() {
    init_test_logging();
    let ledger = Arc::new(RunLedger::new());
    let service = Arc::new(LoopbackIdentity::new(Duration::from_millis(20)));
    let config = HarnessConfig {
        tick_ms: 10,
        settle_ms: 100,
        ..HarnessConfig::default()
    };
    let mut h = Harness::new(
        RuntimePump::new(CancellationToken::new()),
        ledger.clone(),
        service,
        &config,
    );

    scenarios::run_all(&mut h).await.unwrap();

    let summary = ledger.summary(false);
    assert!(summary.is_success(), "{summary}");
    assert_eq!(summary.checks, summary.passed);
    assert!(h.into_pump().ticks() > 0);
}
