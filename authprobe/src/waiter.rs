//! Drives identity operations to completion and reports how they settled
//!
//! [`AsyncWaiter`] owns the [`EventPump`] and is the only code in the harness
//! that yields. A wait never spins past completion and never blocks a thread:
//! it ticks the pump until the operation leaves `Pending` or the pump reports
//! a shutdown request.
//!
//! There is no intrinsic timeout in [`AsyncWaiter::wait`]. Callers that need a
//! bound use [`AsyncWaiter::poll_until`] with an explicit [`TickBudget`].
//!
//! ## Return values
//!
//! Every wait returns `true` when the run should stop (shutdown observed) and
//! `false` otherwise. Mismatches are reported, never returned.

use crate::pump::EventPump;
use crate::report::{Report, ReportSink};
use crate::service::{IdentityService, SessionId};
use authprobe_common::{AuthError, Awaitable, Operation, OperationStatus};
use std::sync::Arc;
use std::time::Duration;

/// Tick size used when none is configured.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Bound on how long [`AsyncWaiter::poll_until`] keeps ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    pub interval: Duration,
    pub max_ticks: Option<u32>,
}

impl TickBudget {
    pub fn new(interval: Duration, max_ticks: u32) -> Self {
        Self {
            interval,
            max_ticks: Some(max_ticks),
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    fn exhausted(&self, ticks: u32) -> bool {
        self.max_ticks.is_some_and(|max| ticks >= max)
    }
}

/// Outcome of a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { ticks: u32 },
    Exhausted { ticks: u32 },
    ShutdownRequested,
}

/// Waits on operations by cooperatively ticking an [`EventPump`].
pub struct AsyncWaiter<P> {
    pump: P,
    sink: Arc<dyn ReportSink>,
    tick: Duration,
}

impl<P: EventPump> AsyncWaiter<P> {
    pub fn new(pump: P, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            pump,
            sink,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn sink(&self) -> &Arc<dyn ReportSink> {
        &self.sink
    }

    pub fn pump(&self) -> &P {
        &self.pump
    }

    pub fn pump_mut(&mut self) -> &mut P {
        &mut self.pump
    }

    pub fn into_pump(self) -> P {
        self.pump
    }

    /// Don't return until `operation` is complete or shutdown is requested.
    ///
    /// An operation that was never started is reported and `false` is
    /// returned without touching the pump. When `log_on_mismatch` is false the
    /// settled code is not reported at all; cleanup calls use this.
    ///
    /// Returns `true` if the run should stop.
    pub async fn wait(
        &mut self,
        operation: &dyn Awaitable,
        label: &str,
        expected: AuthError,
        log_on_mismatch: bool,
    ) -> bool {
        if operation.status() == OperationStatus::Invalid {
            self.sink.emit(&Report::NeverStarted {
                label: label.to_string(),
            });
            return false;
        }

        self.sink.emit(&Report::Calling {
            label: label.to_string(),
        });
        while operation.status() == OperationStatus::Pending {
            if self.pump.tick(self.tick).await {
                tracing::info!("Shutdown requested while waiting for {}", label);
                return true;
            }
        }

        if log_on_mismatch {
            self.report_settlement(operation, label, expected);
        }
        false
    }

    fn report_settlement(&self, operation: &dyn Awaitable, label: &str, expected: AuthError) {
        // Complete always carries a code; treat a missing one as a generic failure.
        let actual = operation.error().unwrap_or(AuthError::Failure);
        let message = operation.error_message();
        let report = if actual == expected {
            Report::CompletedAsExpected {
                label: label.to_string(),
                error: actual,
                message,
            }
        } else {
            Report::Mismatch {
                label: label.to_string(),
                expected,
                actual,
                message,
            }
        };
        self.sink.emit(&report);
    }

    /// Wait for an operation that produces a session, then check that the
    /// session it settled with is the service's current one.
    ///
    /// Success without a session (or failure with one) is reported as an
    /// inconsistent result. Failed operations are not compared with the
    /// current session.
    pub async fn wait_for_session(
        &mut self,
        operation: &Operation<SessionId>,
        label: &str,
        expected: AuthError,
        service: &dyn IdentityService,
    ) -> bool {
        if self.wait(operation, label, expected, true).await {
            return true;
        }

        let Some(settlement) = operation.settlement() else {
            return false;
        };

        let has_result = settlement.result.is_some();
        if settlement.error.is_success() != has_result {
            self.sink.emit(&Report::InconsistentResult {
                label: label.to_string(),
                error: settlement.error,
                has_result,
            });
            return false;
        }

        if let Some(session) = settlement.result {
            let current = service.current_session();
            if current != Some(session) {
                self.sink.emit(&Report::SessionMismatch {
                    label: label.to_string(),
                    operation: Some(session),
                    current,
                });
            }
        }
        false
    }

    /// Tick until `condition` holds, the budget runs out or shutdown is
    /// requested. The condition is checked before every tick.
    pub async fn poll_until(
        &mut self,
        budget: TickBudget,
        mut condition: impl FnMut() -> bool,
    ) -> PollOutcome {
        let mut ticks = 0;
        loop {
            if condition() {
                return PollOutcome::Satisfied { ticks };
            }
            if budget.exhausted(ticks) {
                return PollOutcome::Exhausted { ticks };
            }
            if self.pump.tick(budget.interval).await {
                return PollOutcome::ShutdownRequested;
            }
            ticks += 1;
        }
    }

    /// Wait for the current session to go away, then give listeners one
    /// `settle` tick to catch up. Prefer listener counts over this where
    /// possible.
    pub async fn wait_for_sign_out(
        &mut self,
        service: &dyn IdentityService,
        max_ticks: Option<u32>,
        settle: Duration,
    ) -> bool {
        let budget = TickBudget {
            interval: self.tick,
            max_ticks,
        };
        match self
            .poll_until(budget, || service.current_session().is_none())
            .await
        {
            PollOutcome::ShutdownRequested => return true,
            PollOutcome::Exhausted { ticks } => {
                self.sink.emit(&Report::Expectation {
                    detail: format!("session still active after {ticks} ticks waiting for sign-out"),
                    success: false,
                });
            }
            PollOutcome::Satisfied { ticks } => {
                tracing::debug!("Signed out after {} ticks", ticks);
            }
        }
        self.pump.tick(settle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReportSink;
    use crate::test_utils::ScriptedPump;
    use authprobe_common::pending;

    fn waiter(pump: ScriptedPump) -> (AsyncWaiter<ScriptedPump>, Arc<RecordingReportSink>) {
        let sink = Arc::new(RecordingReportSink::new());
        (AsyncWaiter::new(pump, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_poll_until_satisfied_immediately() {
        let (mut waiter, _sink) = waiter(ScriptedPump::new());
        let outcome = waiter
            .poll_until(TickBudget::new(Duration::from_millis(1), 5), || true)
            .await;
        assert_eq!(outcome, PollOutcome::Satisfied { ticks: 0 });
        assert_eq!(waiter.pump().ticks(), 0);
    }

    #[tokio::test]
    async fn test_poll_until_exhausts_budget() {
        let (mut waiter, _sink) = waiter(ScriptedPump::new());
        let outcome = waiter
            .poll_until(TickBudget::new(Duration::from_millis(300), 3), || false)
            .await;
        assert_eq!(outcome, PollOutcome::Exhausted { ticks: 3 });
        assert_eq!(waiter.pump().ticks(), 3);
        assert!(
            waiter
                .pump()
                .hints()
                .iter()
                .all(|h| *h == Duration::from_millis(300))
        );
    }

    #[tokio::test]
    async fn test_poll_until_observes_shutdown() {
        let (mut waiter, _sink) = waiter(ScriptedPump::with_answers([false, true]));
        let outcome = waiter
            .poll_until(TickBudget::unbounded(Duration::from_millis(1)), || false)
            .await;
        assert_eq!(outcome, PollOutcome::ShutdownRequested);
        assert_eq!(waiter.pump().ticks(), 2);
    }

    #[tokio::test]
    async fn test_suppressed_logging_still_waits() {
        let (completer, op) = pending::<()>();
        let pump = ScriptedPump::new().on_tick(move |tick| {
            if tick == 3 {
                let _ = completer.fail(AuthError::Failure, "cleanup failed");
            }
        });
        let (mut waiter, sink) = waiter(pump);

        assert!(!waiter.wait(&op, "cleanup", AuthError::None, false).await);
        assert_eq!(waiter.pump().ticks(), 3);
        assert!(sink.failures().is_empty());
    }

    #[tokio::test]
    async fn test_wait_uses_configured_tick() {
        let (completer, op) = pending::<()>();
        let pump = ScriptedPump::new().on_tick(move |_| {
            let _ = completer.succeed(());
        });
        let (waiter, _sink) = waiter(pump);
        let mut waiter = waiter.with_tick(Duration::from_millis(40));

        assert!(!waiter.wait(&op, "tick size", AuthError::None, true).await);
        assert_eq!(waiter.pump().hints(), &[Duration::from_millis(40)]);
    }
}
