//! # Scenarios
//!
//! The harness run itself: sequences of (request, wait, verification)
//! against an [`IdentityService`].
//!
//! Every verification is non-fatal and ends up as a report. The only thing
//! that stops a run early is a shutdown request observed by the event pump,
//! which travels up as `Err(ShutdownRequested)` through `?`.
//!
//! ## Run order
//!
//! 1. Sign out whatever session a previous run left behind.
//! 2. [`listeners::listener_counts`]: notification counts per call.
//! 3. [`flows::account_flows`]: password accounts and their error codes.
//! 4. [`flows::session_flows`]: linking, unlinking, token refresh,
//!    deletion, and the profile and credential calls of an email user.
//! 5. Sign in anonymously so the next run starts with a session.

pub mod account;
pub mod flows;
pub mod listeners;
pub mod profile;

pub use account::{ScopedAccount, unique_email};

use crate::config::HarnessConfig;
use crate::pump::EventPump;
use crate::report::{Report, ReportSink};
use crate::service::{IdentityService, SessionId};
use crate::waiter::AsyncWaiter;
use authprobe_common::{AuthError, Awaitable, Operation};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The event pump asked the run to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shutdown requested")]
pub struct ShutdownRequested;

/// Result of one scenario step.
pub type Step<T = ()> = Result<T, ShutdownRequested>;

fn stop_if(shutdown: bool) -> Step {
    if shutdown {
        Err(ShutdownRequested)
    } else {
        Ok(())
    }
}

/// Everything a scenario needs: the waiter, the service and run settings.
pub struct Harness<P> {
    waiter: AsyncWaiter<P>,
    service: Arc<dyn IdentityService>,
    settle: Duration,
    sign_out_budget: Option<u32>,
    password: String,
    provider_id: String,
}

impl<P: EventPump> Harness<P> {
    pub fn new(
        pump: P,
        sink: Arc<dyn ReportSink>,
        service: Arc<dyn IdentityService>,
        config: &HarnessConfig,
    ) -> Self {
        Self {
            waiter: AsyncWaiter::new(pump, sink).with_tick(config.tick()),
            service,
            settle: config.settle(),
            sign_out_budget: config.sign_out_budget_ticks,
            password: config.password.clone(),
            provider_id: config.loopback.provider_id.clone(),
        }
    }

    pub fn service(&self) -> &dyn IdentityService {
        self.service.as_ref()
    }

    pub fn sink(&self) -> Arc<dyn ReportSink> {
        Arc::clone(self.waiter.sink())
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Provider id the service is expected to report for its users.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn into_pump(self) -> P {
        self.waiter.into_pump()
    }

    pub fn note(&self, message: impl Into<String>) {
        self.waiter.sink().emit(&Report::note(message));
    }

    pub async fn wait(&mut self, operation: &dyn Awaitable, label: &str, expected: AuthError) -> Step {
        stop_if(self.waiter.wait(operation, label, expected, true).await)
    }

    /// Wait without reporting how the operation settled. Used for cleanup.
    pub async fn wait_quietly(&mut self, operation: &dyn Awaitable, label: &str) -> Step {
        stop_if(self.waiter.wait(operation, label, AuthError::None, false).await)
    }

    pub async fn wait_for_session(
        &mut self,
        operation: &Operation<SessionId>,
        label: &str,
        expected: AuthError,
    ) -> Step {
        let shutdown = self
            .waiter
            .wait_for_session(operation, label, expected, self.service.as_ref())
            .await;
        stop_if(shutdown)
    }

    /// Sign out and wait for the session to go away plus one settle tick.
    pub async fn sign_out(&mut self) -> Step {
        self.service.sign_out();
        let shutdown = self
            .waiter
            .wait_for_sign_out(self.service.as_ref(), self.sign_out_budget, self.settle)
            .await;
        stop_if(shutdown)
    }

    /// Keep the pump running until shutdown is requested.
    pub async fn linger(&mut self) {
        tracing::info!("Run finished; lingering until shutdown");
        let tick = self.waiter.tick();
        while !self.waiter.pump_mut().tick(tick).await {}
    }
}

/// Sign out a session left over from a previous run.
pub async fn sign_out_previous<P: EventPump>(h: &mut Harness<P>) -> Step {
    if let Some(session) = h.service().current_session() {
        h.note(format!("Signing out {session} from a previous run"));
        h.sign_out().await?;
    }
    Ok(())
}

/// Leave a session behind so the next run exercises the sign-out path.
pub async fn final_sign_in<P: EventPump>(h: &mut Harness<P>) -> Step {
    let op = h.service().sign_in_anonymously();
    h.wait_for_session(&op, "SignInAnonymously() at exit", AuthError::None)
        .await
}

/// Run every scenario in order.
pub async fn run_all<P: EventPump>(h: &mut Harness<P>) -> Step {
    sign_out_previous(h).await?;
    listeners::listener_counts(h).await?;
    flows::account_flows(h).await?;
    flows::session_flows(h).await?;
    final_sign_in(h).await?;
    h.note("All scenarios finished");
    Ok(())
}
