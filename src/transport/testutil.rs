//! In-memory session and connector used by the client unit tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::call::CallSender;
use crate::transport::{Call, Connector, Network, Session};

/// `Hang` never replies, `Fail` returns a remote error, anything else echoes.
#[derive(Default)]
pub(crate) struct FakeSession {
    closed: AtomicBool,
    fail_close: AtomicBool,
    hung: Mutex<Vec<CallSender>>,
    calls: AtomicUsize,
}

impl FakeSession {
    /// Behaves like a session whose connection dropped.
    pub(crate) fn sever(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.hung.lock().unwrap().clear();
    }

    pub(crate) fn fail_next_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for Arc<FakeSession> {
    async fn go(&self, method: &str, args: Value) -> Call {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Call::ready(method, Err(Error::Shutdown));
        }
        match method {
            "Hang" => {
                let (call, done) = Call::pending(method);
                self.hung.lock().unwrap().push(done);
                call
            }
            "Fail" => Call::ready(method, Err(Error::Remote("boom".into()))),
            _ => Call::ready(method, Ok(args)),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.fail_close.swap(false, Ordering::SeqCst) {
            return Err(Error::Close(io::Error::other("close failed")));
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::Shutdown);
        }
        self.hung.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    refuse: AtomicBool,
}

impl FakeConnector {
    pub(crate) fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn dials(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Arc<FakeSession> {
        Arc::clone(self.sessions.lock().unwrap().last().unwrap())
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _network: Network,
        address: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Dial {
                address: address.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        let session = Arc::new(FakeSession::default());
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(Box::new(session))
    }
}
