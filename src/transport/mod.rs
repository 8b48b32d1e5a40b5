//! Transport layer
//!
//! The client only talks to the network through two seams: a [`Connector`]
//! that dials and hands back a [`Session`], and the session itself, which
//! multiplexes calls over one connection.

pub mod call;
pub mod dialer;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use call::Call;
pub use dialer::{NetConnector, Network};
pub use session::RpcSession;

/// A live request/response session over one connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Starts a call and returns its handle once the request is queued.
    /// May wait while the session's send queue is full.
    async fn go(&self, method: &str, args: Value) -> Call;

    /// Closes the connection. Returns [`crate::error::Error::Shutdown`] if the
    /// session was already closed or lost its connection.
    async fn close(&self) -> Result<()>;
}

/// Dials a network address and wraps the connection in a session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        network: Network,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Session>>;
}
