//! # Utility Modules
//!
//! Cross-cutting helpers used throughout the harness.
//!
//! ## Sub-modules
//!
//! - **`logging`**: initializes the `tracing` subscriber (rolling file or stderr).

pub mod logging;
