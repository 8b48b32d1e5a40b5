//! Resilient RPC client.
//!
//! Wraps a JSON-lines RPC session in a long-lived [`Client`] that survives
//! connection loss, probes liveness with an optional heartbeat, and lets
//! callers cancel in-flight calls.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod transport;

pub use client::{Client, DialOptions, dial};
pub use context::Context;
pub use error::{Error, Result};
pub use transport::Call;
