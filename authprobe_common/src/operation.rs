//! Lifecycle of a single asynchronous identity request.
//!
//! An [`Operation`] is the read side of a request issued to an identity
//! service. It is backed by a `tokio::sync::watch` channel so the settled
//! state is a single source of truth that any clone of the handle can read
//! synchronously, from any thread, without waiting.
//!
//! The producer keeps the matching [`OperationCompleter`] and settles the
//! request exactly once:
//!
//! ```text
//! Pending ──complete()──► Complete { error, message?, result? }
//! Invalid (never started, never changes)
//! ```
//!
//! # Example
//!
//! ```rust
//! use authprobe_common::{AuthError, OperationStatus, pending};
//!
//! let (completer, operation) = pending::<u64>();
//! assert_eq!(operation.status(), OperationStatus::Pending);
//!
//! completer.succeed(7).unwrap();
//! assert_eq!(operation.status(), OperationStatus::Complete);
//! assert_eq!(operation.error(), Some(AuthError::None));
//! assert_eq!(operation.result(), Some(7));
//!
//! // Settling twice is rejected and the first settlement wins.
//! assert!(completer.fail(AuthError::Failure, "late").is_err());
//! assert_eq!(operation.result(), Some(7));
//! ```

use crate::error_code::AuthError;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable status of an operation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The request was never started. This never changes.
    Invalid,
    /// Issued but not settled yet.
    Pending,
    /// Settled; error code, message and result are fixed from now on.
    Complete,
}

/// Terminal outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement<T> {
    pub error: AuthError,
    pub message: Option<String>,
    pub result: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OperationState<T> {
    Invalid,
    Pending,
    Complete(Settlement<T>),
}

/// Returned when a completer tries to settle an operation a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation has already been settled")]
pub struct AlreadyComplete;

/// Read handle for an asynchronous request.
#[derive(Debug)]
pub struct Operation<T> {
    receiver: watch::Receiver<OperationState<T>>,
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> Operation<T> {
    /// A handle for a request that was never started.
    pub fn invalid() -> Self {
        let (_sender, receiver) = watch::channel(OperationState::Invalid);
        Self { receiver }
    }

    /// A handle that is already complete.
    pub fn settled(error: AuthError, message: Option<String>, result: Option<T>) -> Self {
        let (_sender, receiver) = watch::channel(OperationState::Complete(Settlement {
            error,
            message,
            result,
        }));
        Self { receiver }
    }

    pub fn status(&self) -> OperationStatus {
        match &*self.receiver.borrow() {
            OperationState::Invalid => OperationStatus::Invalid,
            OperationState::Pending => OperationStatus::Pending,
            OperationState::Complete(_) => OperationStatus::Complete,
        }
    }

    /// Settled error code; `None` until the operation is complete.
    pub fn error(&self) -> Option<AuthError> {
        match &*self.receiver.borrow() {
            OperationState::Complete(settlement) => Some(settlement.error),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match &*self.receiver.borrow() {
            OperationState::Complete(settlement) => settlement.message.clone(),
            _ => None,
        }
    }

    /// True when both handles observe the same underlying request.
    pub fn is_same(&self, other: &Self) -> bool {
        self.receiver.same_channel(&other.receiver)
    }
}

impl<T: Clone> Operation<T> {
    /// Settled payload, if the operation completed with one.
    pub fn result(&self) -> Option<T> {
        match &*self.receiver.borrow() {
            OperationState::Complete(settlement) => settlement.result.clone(),
            _ => None,
        }
    }

    pub fn settlement(&self) -> Option<Settlement<T>> {
        match &*self.receiver.borrow() {
            OperationState::Complete(settlement) => Some(settlement.clone()),
            _ => None,
        }
    }
}

/// Producer side of an [`Operation`]. Cloning shares the same request.
#[derive(Debug)]
pub struct OperationCompleter<T> {
    sender: Arc<watch::Sender<OperationState<T>>>,
}

impl<T> Clone for OperationCompleter<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

/// Start a new pending request, returning its completer and read handle.
pub fn pending<T>() -> (OperationCompleter<T>, Operation<T>) {
    let (sender, receiver) = watch::channel(OperationState::Pending);
    (
        OperationCompleter {
            sender: Arc::new(sender),
        },
        Operation { receiver },
    )
}

impl<T> OperationCompleter<T> {
    /// Another read handle for the request this completer settles.
    pub fn operation(&self) -> Operation<T> {
        Operation {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(&*self.sender.borrow(), OperationState::Complete(_))
    }

    /// Transition Pending -> Complete. Only the first call takes effect.
    pub fn complete(
        &self,
        error: AuthError,
        message: Option<String>,
        result: Option<T>,
    ) -> Result<(), AlreadyComplete> {
        let mut settlement = Some(Settlement {
            error,
            message,
            result,
        });
        let mut transitioned = false;
        self.sender.send_if_modified(|state| {
            if matches!(state, OperationState::Pending)
                && let Some(settlement) = settlement.take()
            {
                *state = OperationState::Complete(settlement);
                transitioned = true;
            }
            transitioned
        });
        if transitioned {
            Ok(())
        } else {
            Err(AlreadyComplete)
        }
    }

    pub fn succeed(&self, result: T) -> Result<(), AlreadyComplete> {
        self.complete(AuthError::None, None, Some(result))
    }

    pub fn fail(&self, error: AuthError, message: impl Into<String>) -> Result<(), AlreadyComplete> {
        self.complete(error, Some(message.into()), None)
    }
}

/// Type-erased view of an operation, enough to drive it to completion and
/// classify its outcome without knowing the payload type.
pub trait Awaitable: Send + Sync {
    fn status(&self) -> OperationStatus;
    fn error(&self) -> Option<AuthError>;
    fn error_message(&self) -> Option<String>;
}

impl<T: Send + Sync> Awaitable for Operation<T> {
    fn status(&self) -> OperationStatus {
        Operation::status(self)
    }

    fn error(&self) -> Option<AuthError> {
        Operation::error(self)
    }

    fn error_message(&self) -> Option<String> {
        Operation::error_message(self)
    }
}
