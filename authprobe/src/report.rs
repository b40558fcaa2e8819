//! Pass/fail reports emitted while exercising an identity service
//!
//! Nothing in the harness throws on a failed expectation. Every outcome, good
//! or bad, becomes a [`Report`] handed to a [`ReportSink`], so one broken call
//! never hides the results of the calls after it.
//!
//! ## Key Components
//!
//! - [`Report`]: every kind of line the harness can produce
//! - [`ReportSink`]: where reports go
//! - [`LoggingReportSink`]: writes reports through `tracing`
//! - [`RecordingReportSink`]: keeps reports in memory for assertions
//! - [`RunLedger`]: logs and tallies a whole run into a [`RunSummary`]

use crate::service::{EventKind, SessionId};
use authprobe_common::{AuthError, StateMachine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

const FAILURE_PREFIX: &str = "ERROR: ";

/// A single harness report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// About to drive an operation to completion.
    Calling { label: String },
    /// The operation handle was never started (a caller-side defect).
    NeverStarted { label: String },
    /// Settled with the expected code.
    CompletedAsExpected {
        label: String,
        error: AuthError,
        message: Option<String>,
    },
    /// Settled with a code other than the expected one.
    Mismatch {
        label: String,
        expected: AuthError,
        actual: AuthError,
        message: Option<String>,
    },
    /// Success without a payload, or failure with one.
    InconsistentResult {
        label: String,
        error: AuthError,
        has_result: bool,
    },
    /// The session returned by an operation is not the service's current one.
    SessionMismatch {
        label: String,
        operation: Option<SessionId>,
        current: Option<SessionId>,
    },
    /// A listener count was checked against its tolerated range.
    CounterVerified {
        kind: EventKind,
        label: String,
        count: u32,
        min: u32,
        max: u32,
        success: bool,
    },
    /// Result of an `expect_*` helper.
    Expectation { detail: String, success: bool },
    /// Free-form progress line.
    Note { message: String },
}

impl Report {
    /// `Some(passed)` for reports that carry a verdict, `None` for progress lines.
    pub fn verdict(&self) -> Option<bool> {
        match self {
            Report::Calling { .. } | Report::Note { .. } => None,
            Report::CompletedAsExpected { .. } => Some(true),
            Report::NeverStarted { .. }
            | Report::Mismatch { .. }
            | Report::InconsistentResult { .. }
            | Report::SessionMismatch { .. } => Some(false),
            Report::CounterVerified { success, .. } | Report::Expectation { success, .. } => {
                Some(*success)
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        self.verdict() == Some(false)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Report::Note {
            message: message.into(),
        }
    }
}

fn session_str(session: &Option<SessionId>) -> String {
    session.map_or_else(|| "none".to_string(), |s| s.to_string())
}

fn plural(n: u32) -> &'static str {
    if n == 1 { "" } else { "s" }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_failure() {
            f.write_str(FAILURE_PREFIX)?;
        }
        match self {
            Report::Calling { label } => write!(f, "  Calling {label}..."),
            Report::NeverStarted { label } => {
                write!(f, "operation for {label} was never started")
            }
            Report::CompletedAsExpected {
                label,
                error,
                message,
            } => match message {
                Some(message) => {
                    write!(f, "{label} completed as expected, error: {error} '{message}'")
                }
                None => write!(f, "{label} completed as expected"),
            },
            Report::Mismatch {
                label,
                expected,
                actual,
                message,
            } => {
                write!(
                    f,
                    "{label} completed with error: {actual} instead of {expected}"
                )?;
                if let Some(message) = message {
                    write!(f, ", `{message}`")?;
                }
                Ok(())
            }
            Report::InconsistentResult {
                label,
                error,
                has_result,
            } => {
                let state = if *has_result { "a" } else { "no" };
                write!(f, "{label} settled with {error} but carried {state} result")
            }
            Report::SessionMismatch {
                label,
                operation,
                current,
            } => write!(
                f,
                "{label}: operation's session ({}) and current session ({}) don't match",
                session_str(operation),
                session_str(current)
            ),
            Report::CounterVerified {
                kind,
                label,
                count,
                min,
                max,
                ..
            } => {
                write!(
                    f,
                    "{kind}Listener called {count} time{} on {label}.",
                    plural(*count)
                )?;
                if min == max {
                    write!(f, " (expected {min})")
                } else {
                    write!(f, " (expected {min}-{max})")
                }
            }
            Report::Expectation { detail, .. } => f.write_str(detail),
            Report::Note { message } => f.write_str(message),
        }
    }
}

/// Destination for harness reports.
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &Report);
}

/// Writes every report through `tracing`; failures at `error`, the rest at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReportSink;

impl ReportSink for LoggingReportSink {
    fn emit(&self, report: &Report) {
        if report.is_failure() {
            tracing::error!("{report}");
        } else {
            tracing::info!("{report}");
        }
    }
}

/// Keeps every report, in order. Used by tests to assert on harness output.
#[derive(Debug, Default)]
pub struct RecordingReportSink {
    reports: StateMachine<Vec<Report>>,
}

impl RecordingReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.snapshot()
    }

    pub fn failures(&self) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.is_failure())
            .cloned()
            .collect()
    }

    /// Number of recorded reports matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Report) -> bool) -> usize {
        self.reports.lock().iter().filter(|r| predicate(r)).count()
    }

    pub fn clear(&self) {
        self.reports.transition(Vec::clear);
    }
}

impl ReportSink for RecordingReportSink {
    fn emit(&self, report: &Report) {
        tracing::debug!("recorded: {report}");
        self.reports.transition(|reports| reports.push(report.clone()));
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub shutdown_requested: bool,
    pub failures: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.shutdown_requested
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "{} checks, {} passed, {} failed in {:.1}s{}",
            self.checks,
            self.passed,
            self.failed,
            elapsed.num_milliseconds() as f64 / 1000.0,
            if self.shutdown_requested {
                " (shutdown requested)"
            } else {
                ""
            }
        )?;
        for failure in &self.failures {
            writeln!(f, "  {failure}")?;
        }
        Ok(())
    }
}

/// Logs every report and tallies verdicts for the whole run.
#[derive(Debug)]
pub struct RunLedger {
    started_at: DateTime<Utc>,
    passed: AtomicUsize,
    failed: AtomicUsize,
    failures: StateMachine<Vec<String>>,
}

impl Default for RunLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLedger {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            passed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            failures: StateMachine::new(Vec::new()),
        }
    }

    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn summary(&self, shutdown_requested: bool) -> RunSummary {
        let passed = self.passed();
        let failed = self.failed();
        RunSummary {
            started_at: self.started_at,
            finished_at: Utc::now(),
            checks: passed + failed,
            passed,
            failed,
            shutdown_requested,
            failures: self.failures.snapshot(),
        }
    }
}

impl ReportSink for RunLedger {
    fn emit(&self, report: &Report) {
        LoggingReportSink.emit(report);
        match report.verdict() {
            Some(true) => {
                self.passed.fetch_add(1, Ordering::SeqCst);
            }
            Some(false) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                let line = report.to_string();
                self.failures.transition(|failures| failures.push(line));
            }
            None => {}
        }
    }
}
