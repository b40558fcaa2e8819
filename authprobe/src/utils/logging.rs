//! # Logging Initialization
//!
//! Centralized setup of the `tracing` subscriber for the harness.
//!
//! ## Core Functionality
//!
//! - **`init_logging()`**: called once at the start of the process. A
//!   `std::sync::Once` makes repeated calls harmless, which lets every test
//!   call [`init_test_logging`] freely.
//!
//! ## Logging Configuration
//!
//! 1.  **Environment Filter (`EnvFilter`)**: `RUST_LOG` wins when set.
//!     Otherwise the given level applies everywhere, with `debug` for the
//!     `authprobe` crate itself.
//!
//! 2.  **File Logging (Default)**: a daily rolling file in the user cache
//!     directory (from the `directories` crate), written without ANSI colors
//!     through a non-blocking `tracing_appender` writer.
//!
//! 3.  **Stderr Logging (Opt-in)**: with `log_to_file = false` everything goes
//!     to stderr with colors.
//!
//! 4.  **Stderr Fallback**: if the cache directory cannot be determined or
//!     created, logging falls back to stderr.
//!
//! ## Usage
//!
//! For terminal debugging: `init_logging("debug", false)`.
//! For unattended runs: `init_logging("info", true)`.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

const LOG_FILE_NAME: &str = "authprobe.log";

pub fn init_test_logging() {
    let _ = init_logging("trace", false);
}

/// Directory that holds the rolling log file, if one can be determined.
pub fn log_directory() -> Option<std::path::PathBuf> {
    ProjectDirs::from("com", "AuthProbe", "authprobe").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Initializes the logging system.
///
/// Sets a global tracing subscriber writing either to stderr (with colors)
/// or to a daily rolling file in the project's cache directory.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},authprobe=debug")));

        let log_dir = if log_to_file { log_directory() } else { None };
        match log_dir {
            Some(dir) if prepare_log_dir(&dir) => {
                let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(non_blocking).with_ansi(false))
                    .init();
                // Leaked so buffered lines are flushed at exit.
                Box::leak(Box::new(guard));
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(stderr).with_ansi(true))
                    .init();
            }
        }
    });

    Ok(())
}

/// Create the log directory and check that it accepts new files.
fn prepare_log_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".authprobe_write_test");
    let writable = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}
