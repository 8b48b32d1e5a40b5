//! Error handling
//!
//! Defines the error taxonomy shared by the client, transport and config.

pub mod handlers;
pub mod types;

pub use types::*;
