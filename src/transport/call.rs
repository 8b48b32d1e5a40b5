//! Module `call`
//!
//! Handle for one in-flight call. Resolves to the call's terminal result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Completion slot held by whoever finishes the call. Sending on it never
/// blocks, and a send after the caller lost interest is simply dropped.
/// Dropping it unsent completes the call with a shutdown error.
pub(crate) struct CallSender {
    tx: Option<oneshot::Sender<Result<Value>>>,
    finished: Arc<AtomicBool>,
}

impl CallSender {
    /// Completes the call. Hands `result` back if the call was dropped.
    pub(crate) fn send(mut self, result: Result<Value>) -> std::result::Result<(), Result<Value>> {
        self.finished.store(true, Ordering::Release);
        match self.tx.take() {
            Some(tx) => tx.send(result),
            None => Err(result),
        }
    }
}

impl Drop for CallSender {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// An asynchronous call. Await it to get the reply.
pub struct Call {
    method: String,
    done: oneshot::Receiver<Result<Value>>,
    finished: Arc<AtomicBool>,
}

impl Call {
    pub(crate) fn pending(method: &str) -> (Self, CallSender) {
        let (tx, rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let call = Self {
            method: method.to_string(),
            done: rx,
            finished: Arc::clone(&finished),
        };
        let sender = CallSender {
            tx: Some(tx),
            finished,
        };
        (call, sender)
    }

    /// A call that has already completed with `result`.
    pub fn ready(method: &str, result: Result<Value>) -> Self {
        let (call, tx) = Self::pending(method);
        let _ = tx.send(result);
        call
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// True once the call has a terminal result, whether or not it has
    /// been awaited.
    pub fn is_done(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Future for Call {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // A dropped completion slot means the session went away mid-call.
        Pin::new(&mut this.done)
            .poll(cx)
            .map(|done| done.unwrap_or_else(|_| Err(Error::Shutdown)))
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("done", &self.is_done())
            .finish()
    }
}
