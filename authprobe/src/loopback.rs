//! In-process identity service.
//!
//! `LoopbackIdentity` implements [`IdentityService`] without any network or
//! persistence so the harness can run end to end on its own and so the
//! scenarios can be tested. Requests settle on spawned tokio tasks after a
//! fixed latency; notifications are delivered from those tasks just before
//! the request settles.
//!
//! It keeps only enough bookkeeping to settle requests with the codes the
//! scenarios expect: unknown email, wrong password, duplicate email, unknown
//! provider and "no signed-in user". Must be used from within a tokio
//! runtime.

use crate::service::{
    EventKind, EventListener, IdentityService, ListenerId, SessionId, UserProfile,
};
use authprobe_common::{AuthError, Operation, StateMachine, pending};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Provider id reported for every loopback user.
pub const LOOPBACK_PROVIDER_ID: &str = "loopback";

/// Provider id of an email/password credential.
pub const PASSWORD_PROVIDER: &str = "password";

type Outcome<T> = Result<T, (AuthError, String)>;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    id: SessionId,
    email: Option<String>,
    token_serial: u64,
    created_at: DateTime<Utc>,
    last_sign_in_at: DateTime<Utc>,
}

impl ActiveSession {
    fn token(&self) -> String {
        format!("token.{}.{}", self.id, self.token_serial)
    }
}

#[derive(Debug, Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    current: Option<ActiveSession>,
}

impl Directory {
    /// The signed-in session, but only if it has an email credential.
    fn email_session(&mut self) -> Result<&mut ActiveSession, (AuthError, String)> {
        match self.current.as_mut() {
            None => Err(no_session_error()),
            Some(active) if active.email.is_none() => Err((
                AuthError::OperationNotAllowed,
                "anonymous users have no email credential".to_string(),
            )),
            Some(active) => Ok(active),
        }
    }
}

/// Handles of the most recent request of each kind.
#[derive(Default)]
struct LastResults {
    sign_in_anonymously: Option<Operation<SessionId>>,
    sign_in_with_password: Option<Operation<SessionId>>,
    create_account: Option<Operation<SessionId>>,
    fetch_providers: Option<Operation<Vec<String>>>,
}

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Arc<dyn EventListener>,
}

struct Inner {
    latency: Duration,
    provider_id: String,
    directory: StateMachine<Directory>,
    listeners: StateMachine<Vec<Registration>>,
    last: StateMachine<LastResults>,
    next_session: AtomicU64,
    next_listener: AtomicU64,
}

impl Inner {
    fn start_session(
        &self,
        directory: &mut Directory,
        email: Option<String>,
        created_at: DateTime<Utc>,
    ) -> SessionId {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        directory.current = Some(ActiveSession {
            id,
            email,
            token_serial: 1,
            created_at,
            last_sign_in_at: Utc::now(),
        });
        id
    }

    fn notify(&self, kind: EventKind) {
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect();
        tracing::trace!("Notifying {} {} listener(s)", listeners.len(), kind);
        for listener in listeners {
            listener.on_notified(kind);
        }
    }
}

/// Notifications for a session change: one "about to change" and one
/// "changed" on each stream.
const SESSION_CHANGE: [EventKind; 4] = [
    EventKind::AuthState,
    EventKind::IdToken,
    EventKind::AuthState,
    EventKind::IdToken,
];

#[derive(Clone)]
pub struct LoopbackIdentity {
    inner: Arc<Inner>,
}

impl LoopbackIdentity {
    pub fn new(latency: Duration) -> Self {
        Self::with_provider_id(latency, LOOPBACK_PROVIDER_ID)
    }

    /// A service whose users report `provider_id`.
    pub fn with_provider_id(latency: Duration, provider_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                latency,
                provider_id: provider_id.into(),
                directory: StateMachine::new(Directory::default()),
                listeners: StateMachine::new(Vec::new()),
                last: StateMachine::new(LastResults::default()),
                next_session: AtomicU64::new(1),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn latency(&self) -> Duration {
        self.inner.latency
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Settle a request after the configured latency.
    ///
    /// `apply` runs on the spawned task; its notifications fire before the
    /// operation settles.
    fn settle_later<T, F>(&self, request: &'static str, apply: F) -> Operation<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&Inner) -> (Outcome<T>, Vec<EventKind>) + Send + 'static,
    {
        let (completer, operation) = pending();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.latency).await;
            let (outcome, events) = apply(&inner);
            for kind in events {
                inner.notify(kind);
            }
            let settled = match outcome {
                Ok(result) => completer.succeed(result),
                Err((error, message)) => {
                    tracing::debug!("{} failing with {}: {}", request, error, message);
                    completer.fail(error, message)
                }
            };
            if let Err(e) = settled {
                tracing::warn!("{}: {}", request, e);
            }
        });
        operation
    }

    /// Settle a request that changes nothing the listeners care about.
    fn settle_quietly<T, F>(&self, request: &'static str, apply: F) -> Operation<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut Directory) -> Outcome<T> + Send + 'static,
    {
        self.settle_later(request, move |inner| {
            (inner.directory.transition(apply), Vec::new())
        })
    }
}

fn no_session_error() -> (AuthError, String) {
    (AuthError::NoSignedInUser, "no user is signed in".to_string())
}

fn no_session<T>() -> (Outcome<T>, Vec<EventKind>) {
    (Err(no_session_error()), Vec::new())
}

fn unknown_email(email: &str) -> (AuthError, String) {
    (AuthError::UserNotFound, format!("no account for {email}"))
}

impl IdentityService for LoopbackIdentity {
    fn current_session(&self) -> Option<SessionId> {
        self.inner.directory.lock().current.as_ref().map(|s| s.id)
    }

    fn add_listener(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        self.inner.listeners.transition(|listeners| {
            listeners.push(Registration { id, kind, listener });
        });
        tracing::debug!("Registered {} listener {:?}", kind, id);
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.transition(|listeners| {
            let before = listeners.len();
            listeners.retain(|r| r.id != id);
            listeners.len() != before
        })
    }

    fn sign_in_anonymously(&self) -> Operation<SessionId> {
        let operation = self.settle_later("sign_in_anonymously", |inner| {
            let id = inner
                .directory
                .transition(|dir| inner.start_session(dir, None, Utc::now()));
            (Ok(id), SESSION_CHANGE.to_vec())
        });
        self.inner
            .last
            .transition(|last| last.sign_in_anonymously = Some(operation.clone()));
        operation
    }

    fn sign_in_anonymously_last_result(&self) -> Operation<SessionId> {
        let last = self.inner.last.lock().sign_in_anonymously.clone();
        last.unwrap_or_else(Operation::invalid)
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Operation<SessionId> {
        let email = email.to_string();
        let password = password.to_string();
        let operation = self.settle_later("sign_in_with_password", move |inner| {
            inner.directory.transition(|dir| {
                let Some(account) = dir.accounts.get(&email).cloned() else {
                    return (Err(unknown_email(&email)), Vec::new());
                };
                if account.password != password {
                    return (
                        Err((AuthError::WrongPassword, "password is invalid".to_string())),
                        Vec::new(),
                    );
                }
                let id = inner.start_session(dir, Some(email.clone()), account.created_at);
                (Ok(id), SESSION_CHANGE.to_vec())
            })
        });
        self.inner
            .last
            .transition(|last| last.sign_in_with_password = Some(operation.clone()));
        operation
    }

    fn sign_in_with_password_last_result(&self) -> Operation<SessionId> {
        let last = self.inner.last.lock().sign_in_with_password.clone();
        last.unwrap_or_else(Operation::invalid)
    }

    fn create_account(&self, email: &str, password: &str) -> Operation<SessionId> {
        let email = email.to_string();
        let password = password.to_string();
        let operation = self.settle_later("create_account", move |inner| {
            inner.directory.transition(|dir| {
                if dir.accounts.contains_key(&email) {
                    return (
                        Err((
                            AuthError::EmailAlreadyInUse,
                            format!("{email} is already in use"),
                        )),
                        Vec::new(),
                    );
                }
                let created_at = Utc::now();
                dir.accounts.insert(
                    email.clone(),
                    Account {
                        password,
                        created_at,
                    },
                );
                let id = inner.start_session(dir, Some(email), created_at);
                (Ok(id), SESSION_CHANGE.to_vec())
            })
        });
        self.inner
            .last
            .transition(|last| last.create_account = Some(operation.clone()));
        operation
    }

    fn create_account_last_result(&self) -> Operation<SessionId> {
        let last = self.inner.last.lock().create_account.clone();
        last.unwrap_or_else(Operation::invalid)
    }

    fn link_password(&self, email: &str, password: &str) -> Operation<SessionId> {
        let email = email.to_string();
        let password = password.to_string();
        self.settle_later("link_password", move |inner| {
            inner.directory.transition(|dir| {
                let Some(current) = dir.current.clone() else {
                    return no_session();
                };
                if current.email.as_deref() == Some(email.as_str()) {
                    return (Ok(current.id), Vec::new());
                }
                if dir.accounts.contains_key(&email) {
                    return (
                        Err((
                            AuthError::EmailAlreadyInUse,
                            format!("{email} belongs to another account"),
                        )),
                        Vec::new(),
                    );
                }
                if let Some(previous) = &current.email {
                    dir.accounts.remove(previous);
                }
                dir.accounts.insert(
                    email.clone(),
                    Account {
                        password,
                        created_at: current.created_at,
                    },
                );
                if let Some(active) = dir.current.as_mut() {
                    active.email = Some(email);
                    active.token_serial += 1;
                }
                (Ok(current.id), vec![EventKind::IdToken])
            })
        })
    }

    fn refresh_token(&self, force: bool) -> Operation<String> {
        self.settle_later("refresh_token", move |inner| {
            inner.directory.transition(|dir| {
                let Some(active) = dir.current.as_mut() else {
                    return no_session();
                };
                if force {
                    active.token_serial += 1;
                    (Ok(active.token()), vec![EventKind::IdToken])
                } else {
                    (Ok(active.token()), Vec::new())
                }
            })
        })
    }

    fn send_password_reset(&self, email: &str) -> Operation<()> {
        let email = email.to_string();
        self.settle_quietly("send_password_reset", move |dir| {
            if dir.accounts.contains_key(&email) {
                Ok(())
            } else {
                Err(unknown_email(&email))
            }
        })
    }

    fn fetch_providers(&self, email: &str) -> Operation<Vec<String>> {
        let email = email.to_string();
        let operation = self.settle_quietly("fetch_providers", move |dir| {
            if dir.accounts.contains_key(&email) {
                Ok(vec![PASSWORD_PROVIDER.to_string()])
            } else {
                Ok(Vec::new())
            }
        });
        self.inner
            .last
            .transition(|last| last.fetch_providers = Some(operation.clone()));
        operation
    }

    fn fetch_providers_last_result(&self) -> Operation<Vec<String>> {
        let last = self.inner.last.lock().fetch_providers.clone();
        last.unwrap_or_else(Operation::invalid)
    }

    fn delete_current_account(&self) -> Operation<()> {
        self.settle_later("delete_current_account", |inner| {
            inner.directory.transition(|dir| {
                let Some(active) = dir.current.take() else {
                    return no_session();
                };
                if let Some(email) = &active.email {
                    dir.accounts.remove(email);
                }
                (Ok(()), vec![EventKind::AuthState, EventKind::IdToken])
            })
        })
    }

    fn current_profile(&self) -> Option<UserProfile> {
        let directory = self.inner.directory.lock();
        let active = directory.current.as_ref()?;
        Some(UserProfile {
            session: active.id,
            email: active.email.clone(),
            display_name: None,
            photo_url: None,
            provider_id: self.inner.provider_id.clone(),
            is_anonymous: active.email.is_none(),
            // Verification links are never followed here.
            is_email_verified: false,
            created_at: Some(active.created_at),
            last_sign_in_at: Some(active.last_sign_in_at),
        })
    }

    fn reload(&self) -> Operation<()> {
        self.settle_quietly("reload", |dir| match dir.current {
            Some(_) => Ok(()),
            None => Err(no_session_error()),
        })
    }

    fn unlink(&self, provider: &str) -> Operation<SessionId> {
        let provider = provider.to_string();
        self.settle_later("unlink", move |inner| {
            inner.directory.transition(|dir| {
                let Some(active) = dir.current.as_mut() else {
                    return no_session();
                };
                let linked = provider == PASSWORD_PROVIDER && active.email.is_some();
                if !linked {
                    return (
                        Err((
                            AuthError::NoSuchProvider,
                            format!("{provider} is not linked to this user"),
                        )),
                        Vec::new(),
                    );
                }
                let id = active.id;
                active.token_serial += 1;
                if let Some(email) = active.email.take() {
                    dir.accounts.remove(&email);
                }
                (Ok(id), vec![EventKind::IdToken])
            })
        })
    }

    fn update_email(&self, email: &str) -> Operation<()> {
        let email = email.to_string();
        self.settle_later("update_email", move |inner| {
            inner.directory.transition(|dir| {
                if dir.accounts.contains_key(&email) {
                    let own = dir
                        .current
                        .as_ref()
                        .is_some_and(|s| s.email.as_deref() == Some(email.as_str()));
                    if own {
                        return (Ok(()), Vec::new());
                    }
                    return (
                        Err((
                            AuthError::EmailAlreadyInUse,
                            format!("{email} belongs to another account"),
                        )),
                        Vec::new(),
                    );
                }
                let active = match dir.email_session() {
                    Ok(active) => active,
                    Err(e) => return (Err(e), Vec::new()),
                };
                let previous = active.email.replace(email.clone());
                active.token_serial += 1;
                if let Some(account) = previous.and_then(|p| dir.accounts.remove(&p)) {
                    dir.accounts.insert(email, account);
                }
                (Ok(()), vec![EventKind::IdToken])
            })
        })
    }

    fn update_password(&self, password: &str) -> Operation<()> {
        let password = password.to_string();
        self.settle_quietly("update_password", move |dir| {
            if password.is_empty() {
                return Err((
                    AuthError::InvalidCredential,
                    "password must not be empty".to_string(),
                ));
            }
            let email = dir.email_session()?.email.clone();
            if let Some(account) = email.and_then(|e| dir.accounts.get_mut(&e)) {
                account.password = password;
            }
            Ok(())
        })
    }

    fn reauthenticate(&self, email: &str, password: &str) -> Operation<()> {
        let email = email.to_string();
        let password = password.to_string();
        self.settle_quietly("reauthenticate", move |dir| {
            let session_email = dir.email_session()?.email.clone();
            if session_email.as_deref() != Some(email.as_str()) {
                return Err((
                    AuthError::InvalidCredential,
                    format!("{email} is not the signed-in user"),
                ));
            }
            let account = dir.accounts.get(&email).ok_or_else(|| unknown_email(&email))?;
            if account.password != password {
                return Err((AuthError::WrongPassword, "password is invalid".to_string()));
            }
            if let Some(active) = dir.current.as_mut() {
                active.last_sign_in_at = Utc::now();
            }
            Ok(())
        })
    }

    fn send_email_verification(&self) -> Operation<()> {
        self.settle_quietly("send_email_verification", |dir| {
            dir.email_session().map(|_| ())
        })
    }

    fn sign_out(&self) {
        let signed_in = self
            .inner
            .directory
            .transition(|dir| dir.current.take().is_some());
        if !signed_in {
            return;
        }
        // The session is gone immediately; listeners hear about it later.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.latency).await;
            inner.notify(EventKind::AuthState);
            inner.notify(EventKind::IdToken);
        });
    }
}
