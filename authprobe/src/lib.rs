//! # Authprobe
//!
//! A harness that exercises an identity (authentication) service from the
//! outside: it issues asynchronous requests, waits for each one to settle,
//! checks the error code it settled with, and counts the notifications the
//! service delivers to its listeners along the way.
//!
//! ## Core Concepts
//!
//! - **Operations**: every asynchronous request returns an
//!   [`Operation`](authprobe_common::Operation) handle that moves from
//!   `Pending` to `Complete` exactly once.
//! - **Cooperative waiting**: [`waiter::AsyncWaiter`] never blocks a thread.
//!   It ticks an [`pump::EventPump`] until the operation settles or a
//!   shutdown is requested.
//! - **Counting listeners**: [`counter::EventCounter`] counts notifications
//!   in a window and verifies them against a tolerated range.
//! - **Reports, not panics**: every check becomes a [`report::Report`]; a
//!   failed check never stops the run.
//!
//! ## Modules
//!
//! - **`service`**: the identity-service contract the harness drives.
//! - **`loopback`**: an in-process implementation of that contract.
//! - **`scenarios`**: the run itself.
//! - **`shell`**: CLI entry point for the `authprobe` binary.

pub mod config;
pub mod counter;
pub mod error;
pub mod expect;
pub mod loopback;
pub mod pump;
pub mod report;
pub mod scenarios;
pub mod service;
pub mod shell;
pub mod test_utils;
pub mod utils;
pub mod waiter;

pub use config::HarnessConfig;
pub use counter::EventCounter;
pub use loopback::LoopbackIdentity;
pub use pump::{EventPump, RuntimePump};
pub use report::{Report, ReportSink, RunLedger, RunSummary};
pub use service::{EventKind, EventListener, IdentityService, ListenerId, SessionId, UserProfile};
pub use waiter::{AsyncWaiter, PollOutcome, TickBudget};
