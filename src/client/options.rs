//! Dial options
//!
//! Everything a [`crate::Client`] is configured with. Options are captured
//! once by [`crate::dial`] and never change afterwards.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::heartbeat::{PingHandler, ReconnectOnShutdown};
use crate::client::interceptor::{AsyncCallInterceptor, CallInterceptor};
use crate::transport::{Connector, NetConnector};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Sink for errors raised where there is no caller to return them to:
/// background connects and heartbeat handling.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn error(&self, message: &str) {
        log::error!(target: "rax_rpc_client", "{}", message);
    }
}

#[derive(Clone)]
pub(crate) struct Heartbeat {
    pub(crate) method: String,
    pub(crate) interval: Duration,
    pub(crate) handler: Arc<dyn PingHandler>,
}

/// Builder for the options accepted by [`crate::dial`].
#[derive(Clone)]
pub struct DialOptions {
    pub(crate) timeout: Duration,
    pub(crate) block: bool,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) heartbeat: Option<Heartbeat>,
    pub(crate) call_interceptor: Option<Arc<dyn CallInterceptor>>,
    pub(crate) async_call_interceptor: Option<Arc<dyn AsyncCallInterceptor>>,
    pub(crate) connector: Arc<dyn Connector>,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            block: false,
            logger: Arc::new(LogLogger),
            heartbeat: None,
            call_interceptor: None,
            async_call_interceptor: None,
            connector: Arc::new(NetConnector),
        }
    }
}

impl DialOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect timeout. Zero falls back to the 5s default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Make [`crate::dial`] wait for the first connect and return its error.
    pub fn block(mut self) -> Self {
        self.block = true;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Enables liveness probing with `method`, which must take and return an
    /// empty object. An empty method name leaves probing off; a zero interval
    /// means 500ms; no handler means [`ReconnectOnShutdown`].
    pub fn heartbeat(
        mut self,
        method: impl Into<String>,
        interval: Duration,
        handler: Option<Arc<dyn PingHandler>>,
    ) -> Self {
        let method = method.into();
        if method.is_empty() {
            return self;
        }
        self.heartbeat = Some(Heartbeat {
            method,
            interval: if interval.is_zero() {
                DEFAULT_HEARTBEAT_INTERVAL
            } else {
                interval
            },
            handler: handler.unwrap_or_else(|| Arc::new(ReconnectOnShutdown)),
        });
        self
    }

    pub fn call_interceptor(mut self, interceptor: Arc<dyn CallInterceptor>) -> Self {
        self.call_interceptor = Some(interceptor);
        self
    }

    pub fn async_call_interceptor(mut self, interceptor: Arc<dyn AsyncCallInterceptor>) -> Self {
        self.async_call_interceptor = Some(interceptor);
        self
    }

    /// Replaces the network dialer, e.g. to add TLS or for tests.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }
}

impl fmt::Debug for DialOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialOptions")
            .field("timeout", &self.timeout)
            .field("block", &self.block)
            .field(
                "heartbeat",
                &self.heartbeat.as_ref().map(|h| (&h.method, h.interval)),
            )
            .field("call_interceptor", &self.call_interceptor.is_some())
            .field("async_call_interceptor", &self.async_call_interceptor.is_some())
            .finish()
    }
}
