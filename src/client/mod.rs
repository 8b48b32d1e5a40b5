//! Client handle
//!
//! A [`Client`] keeps one RPC session alive across connection loss. The
//! active session sits in an atomically swappable slot: calls load it without
//! locking, while `reconnect` and `close` serialize through one async mutex
//! and store a fresh session (or none) when they are done.

pub mod dispatch;
pub mod heartbeat;
pub mod interceptor;
pub mod lifecycle;
pub mod options;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::info;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::transport::{Network, Session};

pub use heartbeat::{PING_TIMEOUT, PingHandler, ReconnectOnShutdown};
pub use interceptor::{AsyncCallInterceptor, AsyncCallInvoker, CallInterceptor, CallInvoker};
pub use options::{DialOptions, LogLogger, Logger};

pub(crate) type SharedSession = Arc<Box<dyn Session>>;

/// Long-lived RPC client. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) session: ArcSwapOption<Box<dyn Session>>,
    pub(crate) lifecycle: Mutex<lifecycle::Lifecycle>,
    pub(crate) network: Network,
    pub(crate) address: Arc<str>,
    pub(crate) options: DialOptions,
}

/// Creates a client for `address` over `network` (`tcp`, `tcp4`, `tcp6`,
/// or `unix`).
///
/// With [`DialOptions::block`] the first connect happens before this returns
/// and its error is returned. Otherwise the connect runs in the background and
/// failures only reach the configured [`Logger`]; calls made before it
/// finishes fail with [`Error::Shutdown`].
pub async fn dial(network: &str, address: &str, options: DialOptions) -> Result<Client> {
    let network: Network = network.parse()?;
    if address.is_empty() {
        return Err(Error::InvalidOption("address must not be empty".into()));
    }

    let client = Client {
        inner: Arc::new(Inner {
            session: ArcSwapOption::empty(),
            lifecycle: Mutex::new(lifecycle::Lifecycle::new()),
            network,
            address: Arc::from(address),
            options,
        }),
    };

    if client.inner.options.block {
        client.reconnect().await?;
    } else {
        let background = client.clone();
        tokio::spawn(async move {
            if let Err(e) = background.reconnect().await {
                background
                    .logger()
                    .error(&format!("[error][rax-rpc]: reconnect: {e}"));
            }
        });
    }

    if let Some(heartbeat) = client.inner.options.heartbeat.clone() {
        info!(
            "Starting heartbeat {} every {:?} for {}",
            heartbeat.method, heartbeat.interval, address
        );
        heartbeat::spawn_monitor(&client, heartbeat);
    }

    Ok(client)
}

impl Client {
    /// The configured target address.
    pub fn remote_address(&self) -> &str {
        &self.inner.address
    }

    /// Whether a session is installed right now. A session that lost its
    /// connection still counts until the next reconnect replaces it.
    pub fn is_connected(&self) -> bool {
        self.inner.session.load().is_some()
    }

    pub fn logger(&self) -> &dyn Logger {
        self.inner.options.logger.as_ref()
    }

    pub(crate) fn current_session(&self) -> Option<SharedSession> {
        self.inner.session.load_full()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("network", &self.inner.network)
            .field("address", &self.inner.address)
            .field("connected", &self.is_connected())
            .finish()
    }
}
