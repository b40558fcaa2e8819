//! # Shell Module
//!
//! Entry point and CLI logic for the `authprobe` binary.
//!
//! ## Sub-modules
//!
//! - **`cli`**: argument parsing, config resolution and the run itself

pub mod cli;

pub use cli::{Cli, OutputFormat, ensure_success, execute, resolve_config, run};
