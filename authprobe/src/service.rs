//! Contract of the identity service under test.
//!
//! The harness never talks to a network or stores accounts itself. It drives
//! whatever implements [`IdentityService`]: every asynchronous request hands
//! back an [`Operation`], and state changes inside the service are announced
//! to registered [`EventListener`]s.

use authprobe_common::Operation;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Which notification stream a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The signed-in session changed (or is about to).
    AuthState,
    /// The session's id token was issued or refreshed.
    IdToken,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::AuthState => f.write_str("AuthState"),
            EventKind::IdToken => f.write_str("IdToken"),
        }
    }
}

/// Identity of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{:x}", self.0)
    }
}

/// Registration handle returned by [`IdentityService::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Snapshot of the signed-in user as the service describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub session: SessionId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider_id: String,
    pub is_anonymous: bool,
    pub is_email_verified: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Receives notifications from an identity service.
pub trait EventListener: Send + Sync {
    fn on_notified(&self, kind: EventKind);
}

/// The identity service surface exercised by the scenarios.
pub trait IdentityService: Send + Sync {
    /// Currently active session, if any.
    fn current_session(&self) -> Option<SessionId>;

    fn add_listener(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> ListenerId;

    /// Returns false if `id` was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    fn sign_in_anonymously(&self) -> Operation<SessionId>;

    /// Handle of the most recent `sign_in_anonymously` request.
    fn sign_in_anonymously_last_result(&self) -> Operation<SessionId>;

    fn sign_in_with_password(&self, email: &str, password: &str) -> Operation<SessionId>;

    fn sign_in_with_password_last_result(&self) -> Operation<SessionId>;

    fn create_account(&self, email: &str, password: &str) -> Operation<SessionId>;

    fn create_account_last_result(&self) -> Operation<SessionId>;

    /// Attach an email/password credential to the current session.
    fn link_password(&self, email: &str, password: &str) -> Operation<SessionId>;

    /// Fetch the current session's id token, optionally forcing a refresh.
    fn refresh_token(&self, force: bool) -> Operation<String>;

    fn send_password_reset(&self, email: &str) -> Operation<()>;

    fn fetch_providers(&self, email: &str) -> Operation<Vec<String>>;

    fn fetch_providers_last_result(&self) -> Operation<Vec<String>>;

    fn delete_current_account(&self) -> Operation<()>;

    /// Profile of the signed-in user, if any.
    fn current_profile(&self) -> Option<UserProfile>;

    /// Refresh the signed-in user's profile from the service.
    fn reload(&self) -> Operation<()>;

    /// Detach `provider` from the signed-in user.
    fn unlink(&self, provider: &str) -> Operation<SessionId>;

    fn update_email(&self, email: &str) -> Operation<()>;

    fn update_password(&self, password: &str) -> Operation<()>;

    /// Confirm the signed-in user's credentials again.
    fn reauthenticate(&self, email: &str, password: &str) -> Operation<()>;

    fn send_email_verification(&self) -> Operation<()>;

    /// Synchronous sign-out. Notifications may land after this returns.
    fn sign_out(&self);
}
