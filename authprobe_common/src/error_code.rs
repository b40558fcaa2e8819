//! Settled error codes reported by identity operations.
//!
//! `AuthError::None` is the success code. Every other variant is a failure the
//! identity service may settle an operation with; the harness only compares
//! codes, it never interprets them.

use std::fmt;

/// Error code carried by a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum AuthError {
    /// Success.
    #[default]
    None = 0,
    Failure = 1,
    InvalidCredential = 2,
    OperationNotAllowed = 3,
    EmailAlreadyInUse = 4,
    UserNotFound = 5,
    WrongPassword = 6,
    NoSuchProvider = 7,
    NoSignedInUser = 8,
    RequiresRecentLogin = 9,
    Cancelled = 10,
}

impl AuthError {
    const ALL: [AuthError; 11] = [
        AuthError::None,
        AuthError::Failure,
        AuthError::InvalidCredential,
        AuthError::OperationNotAllowed,
        AuthError::EmailAlreadyInUse,
        AuthError::UserNotFound,
        AuthError::WrongPassword,
        AuthError::NoSuchProvider,
        AuthError::NoSignedInUser,
        AuthError::RequiresRecentLogin,
        AuthError::Cancelled,
    ];

    /// Numeric wire value of this code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a numeric code back to a variant. Unknown codes collapse to `Failure`.
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|e| e.code() == code)
            .unwrap_or(AuthError::Failure)
    }

    pub fn is_success(self) -> bool {
        self == AuthError::None
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthError::None => "none",
            AuthError::Failure => "failure",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::OperationNotAllowed => "operation_not_allowed",
            AuthError::EmailAlreadyInUse => "email_already_in_use",
            AuthError::UserNotFound => "user_not_found",
            AuthError::WrongPassword => "wrong_password",
            AuthError::NoSuchProvider => "no_such_provider",
            AuthError::NoSignedInUser => "no_signed_in_user",
            AuthError::RequiresRecentLogin => "requires_recent_login",
            AuthError::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}
