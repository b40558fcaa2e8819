//! AsyncWaiter behavior against scripted pumps.

use authprobe::report::{RecordingReportSink, Report};
use authprobe::service::SessionId;
use authprobe::test_utils::{ScriptedPump, init_test_logging};
use authprobe::{AsyncWaiter, IdentityService, LoopbackIdentity};
use authprobe_common::{AuthError, Operation, OperationStatus, pending};
use std::sync::Arc;
use std::time::Duration;

fn waiter(pump: ScriptedPump) -> (AsyncWaiter<ScriptedPump>, Arc<RecordingReportSink>) {
    init_test_logging();
    let sink = Arc::new(RecordingReportSink::new());
    (AsyncWaiter::new(pump, sink.clone()), sink)
}

fn completions(sink: &RecordingReportSink) -> usize {
    sink.count(|r| {
        matches!(
            r,
            Report::CompletedAsExpected { .. } | Report::Mismatch { .. }
        )
    })
}

#[tokio::test]
async fn test_already_complete_success_is_reported_without_ticking() {
    let (mut waiter, sink) = waiter(ScriptedPump::new());
    let op = Operation::settled(AuthError::None, None, Some(()));

    assert!(!waiter.wait(&op, "GetToken()", AuthError::None, true).await);

    assert_eq!(waiter.pump().ticks(), 0);
    assert_eq!(
        sink.count(|r| matches!(r, Report::CompletedAsExpected { .. })),
        1
    );
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_pending_operation_polls_until_complete() {
    let (completer, op) = pending::<()>();
    let pump = ScriptedPump::with_answers([false, false]).on_tick(move |tick| {
        if tick == 2 {
            completer.succeed(()).unwrap();
        }
    });
    let (mut waiter, sink) = waiter(pump);

    assert!(!waiter.wait(&op, "SignOut()", AuthError::None, true).await);

    assert_eq!(waiter.pump().ticks(), 2);
    assert_eq!(completions(&sink), 1);
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_shutdown_on_first_tick_abandons_the_wait() {
    let (_completer, op) = pending::<()>();
    let (mut waiter, sink) = waiter(ScriptedPump::with_answers([true]));

    assert!(waiter.wait(&op, "Delete()", AuthError::None, true).await);

    assert_eq!(waiter.pump().ticks(), 1);
    assert_eq!(completions(&sink), 0);
    assert_eq!(op.status(), OperationStatus::Pending);
}

#[tokio::test]
async fn test_invalid_operation_is_a_local_defect() {
    let (mut waiter, sink) = waiter(ScriptedPump::with_answers([true]));
    let op = Operation::<()>::invalid();

    assert!(!waiter.wait(&op, "Delete()", AuthError::None, true).await);

    assert_eq!(waiter.pump().ticks(), 0);
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], Report::NeverStarted { .. }));
}

#[tokio::test]
async fn test_mismatch_reports_both_codes_and_message() {
    let (mut waiter, sink) = waiter(ScriptedPump::new());
    let op = Operation::<SessionId>::settled(
        AuthError::WrongPassword,
        Some("password is invalid".to_string()),
        None,
    );

    assert!(!waiter.wait(&op, "SignInWithEmailAndPassword()", AuthError::None, true).await);

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0],
        Report::Mismatch {
            label: "SignInWithEmailAndPassword()".to_string(),
            expected: AuthError::None,
            actual: AuthError::WrongPassword,
            message: Some("password is invalid".to_string()),
        }
    );
    let line = failures[0].to_string();
    assert!(line.contains("6 (wrong_password)"));
    assert!(line.contains("0 (none)"));
}

#[tokio::test]
async fn test_expected_failure_code_is_success() {
    let (mut waiter, sink) = waiter(ScriptedPump::new());
    let op = Operation::<()>::settled(AuthError::UserNotFound, Some("no user".into()), None);

    assert!(!waiter.wait(&op, "SendPasswordResetEmail()", AuthError::UserNotFound, true).await);
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_session_variant_flags_inconsistent_and_foreign_sessions() {
    let service = LoopbackIdentity::new(Duration::ZERO);
    let (mut waiter, sink) = waiter(ScriptedPump::new());

    let no_result = Operation::<SessionId>::settled(AuthError::None, None, None);
    waiter
        .wait_for_session(&no_result, "SignInAnonymously()", AuthError::None, &service)
        .await;
    let with_result =
        Operation::settled(AuthError::WrongPassword, None, Some(SessionId(7)));
    waiter
        .wait_for_session(&with_result, "SignIn bad", AuthError::WrongPassword, &service)
        .await;
    assert_eq!(
        sink.count(|r| matches!(r, Report::InconsistentResult { .. })),
        2
    );

    let foreign = Operation::settled(AuthError::None, None, Some(SessionId(99)));
    waiter
        .wait_for_session(&foreign, "SignInAnonymously()", AuthError::None, &service)
        .await;
    assert_eq!(
        sink.count(|r| matches!(r, Report::SessionMismatch { current: None, .. })),
        1
    );

    sink.clear();
    let op = service.sign_in_anonymously();
    assert!(
        !waiter
            .wait_for_session(&op, "SignInAnonymously()", AuthError::None, &service)
            .await
    );
    assert!(sink.failures().is_empty());
    assert_eq!(service.current_session(), op.result());
}

#[tokio::test]
async fn test_wait_for_sign_out_reports_exhausted_budget() {
    let service = LoopbackIdentity::new(Duration::ZERO);
    let op = service.sign_in_anonymously();
    let (mut waiter, sink) = waiter(ScriptedPump::new());
    waiter
        .wait_for_session(&op, "SignInAnonymously()", AuthError::None, &service)
        .await;
    sink.clear();

    // Still signed in: the bounded wait gives up and reports it.
    let shutdown = waiter
        .wait_for_sign_out(&service, Some(3), Duration::from_millis(500))
        .await;
    assert!(!shutdown);
    assert_eq!(sink.failures().len(), 1);

    sink.clear();
    service.sign_out();
    let shutdown = waiter
        .wait_for_sign_out(&service, Some(3), Duration::from_millis(500))
        .await;
    assert!(!shutdown);
    assert!(sink.failures().is_empty());
    assert_eq!(
        waiter.pump().hints().last(),
        Some(&Duration::from_millis(500))
    );
}
