//! Generated accounts for scenarios that need a password identity.

use super::{Harness, Step};
use crate::pump::EventPump;
use authprobe_common::AuthError;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

static EMAIL_COUNTER: AtomicU32 = AtomicU32::new(0);

/// An email address no earlier run (or earlier call) has used.
pub fn unique_email() -> String {
    let n = EMAIL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "authprobe+{}-{n}@example.com",
        Utc::now().format("%Y%m%d%H%M%S%3f")
    )
}

/// A freshly registered account that deletes itself.
///
/// Deletion is async, so it cannot happen in `Drop`; scenarios call
/// [`ScopedAccount::delete`] when they are done. Its reports are suppressed.
#[derive(Debug, Clone)]
pub struct ScopedAccount {
    email: String,
    password: String,
}

impl ScopedAccount {
    /// Register a new account, which also signs it in.
    pub async fn create<P: EventPump>(h: &mut Harness<P>) -> Step<Self> {
        let account = Self {
            email: unique_email(),
            password: h.password().to_string(),
        };
        let op = h.service().create_account(&account.email, &account.password);
        h.wait_for_session(&op, "CreateUserWithEmailAndPassword()", AuthError::None)
            .await?;
        Ok(account)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub async fn sign_in<P: EventPump>(&self, h: &mut Harness<P>) -> Step {
        let op = h.service().sign_in_with_password(&self.email, &self.password);
        h.wait_for_session(&op, "SignInWithEmailAndPassword()", AuthError::None)
            .await
    }

    /// Change the account's email; the new address is used from then on.
    pub async fn update_email<P: EventPump>(&mut self, h: &mut Harness<P>, email: String) -> Step {
        let op = h.service().update_email(&email);
        h.wait(&op, "UpdateEmail()", AuthError::None).await?;
        if op.error() == Some(AuthError::None) {
            self.email = email;
        }
        Ok(())
    }

    /// Change the account's password; the new one is used from then on.
    pub async fn update_password<P: EventPump>(
        &mut self,
        h: &mut Harness<P>,
        password: String,
    ) -> Step {
        let op = h.service().update_password(&password);
        h.wait(&op, "UpdatePassword()", AuthError::None).await?;
        if op.error() == Some(AuthError::None) {
            self.password = password;
        }
        Ok(())
    }

    /// Sign in as this account and delete it.
    pub async fn delete<P: EventPump>(self, h: &mut Harness<P>) -> Step {
        let op = h.service().sign_in_with_password(&self.email, &self.password);
        h.wait_quietly(&op, "SignInWithEmailAndPassword() for cleanup")
            .await?;
        let op = h.service().delete_current_account();
        h.wait_quietly(&op, "Delete() for cleanup").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::loopback::LoopbackIdentity;
    use crate::report::RecordingReportSink;
    use crate::service::IdentityService;
    use crate::test_utils::ScriptedPump;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_updated_credentials_are_used_for_cleanup() {
        let sink = Arc::new(RecordingReportSink::new());
        let service = LoopbackIdentity::new(Duration::ZERO);
        let mut h = Harness::new(
            ScriptedPump::new(),
            sink.clone(),
            Arc::new(service.clone()),
            &HarnessConfig::default(),
        );

        let mut account = ScopedAccount::create(&mut h).await.unwrap();
        let email = unique_email();
        account.update_email(&mut h, email.clone()).await.unwrap();
        account
            .update_password(&mut h, "changed-pw".to_string())
            .await
            .unwrap();
        assert_eq!(account.email(), email);
        assert_eq!(account.password(), "changed-pw");

        account.delete(&mut h).await.unwrap();
        assert!(sink.failures().is_empty());
        assert_eq!(service.current_session(), None);
    }

    #[test]
    fn test_unique_email_differs_per_call() {
        let a = unique_email();
        let b = unique_email();
        assert_ne!(a, b);
        assert!(a.starts_with("authprobe+"));
        assert!(a.ends_with("@example.com"));
    }
}
