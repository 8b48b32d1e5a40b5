//! Error types
//!
//! One taxonomy for every failure the client can surface: lifecycle errors from
//! dialing and closing, token errors from cancellation, and call errors that
//! come back from the session.

use std::io;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the client, its sessions and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable session: never dialed, being rebuilt, or closed for good.
    #[error("connection is shut down")]
    Shutdown,

    /// Connecting to the remote address failed.
    #[error("dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The call's cancellation token was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The call's deadline passed before a reply arrived.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Application-level error string returned by the remote method.
    #[error("{0}")]
    Remote(String),

    /// Closing the transport failed for a reason other than it being shut down.
    #[error("close: {0}")]
    Close(#[source] io::Error),

    /// The connection broke while the call was in flight.
    #[error("transport: {0}")]
    Transport(#[source] io::Error),

    /// A frame could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),

    /// The call was rejected locally by a rate limiter.
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("unknown network: {0}")]
    InvalidNetwork(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Returns true for [`Error::Shutdown`].
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Shutdown)
    }

    /// Returns true when the error came from a cancellation token firing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// Builds a transport error from an io error kind and message.
    pub(crate) fn transport(kind: io::ErrorKind, msg: &str) -> Self {
        Error::Transport(io::Error::new(kind, msg.to_string()))
    }
}
