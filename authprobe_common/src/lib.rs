//! Shared value objects for the authprobe harness: error codes, the
//! operation lifecycle and a small state machine wrapper.

pub mod error_code;
pub mod operation;
pub mod state_machine;

pub use error_code::AuthError;
pub use operation::{
    AlreadyComplete, Awaitable, Operation, OperationCompleter, OperationStatus, Settlement,
    pending,
};
pub use state_machine::StateMachine;
