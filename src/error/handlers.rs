//! Error handlers
//!
//! Reporting helpers used by the command-line probe.

use crate::error::types::Error;
use log::error;

/// Log a client error.
pub fn handle_error(err: &Error) {
    error!("RPC client error: {}", err);
}

/// Convert error to a process exit code.
pub fn error_to_exit_code(err: &Error) -> i32 {
    match err {
        Error::Config(_) | Error::InvalidNetwork(_) | Error::InvalidOption(_) => 2,
        Error::Dial { .. } => 3,
        Error::Cancelled | Error::DeadlineExceeded => 4,
        Error::Remote(_) => 5,
        Error::Shutdown
        | Error::Close(_)
        | Error::Transport(_)
        | Error::Codec(_)
        | Error::RateLimited(_) => 1,
    }
}
