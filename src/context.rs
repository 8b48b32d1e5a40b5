//! Module `context`
//!
//! A cancellation token carried through every call. It combines a
//! [`CancellationToken`] with an optional deadline and the remote address
//! the call is bound for, which interceptors can read as metadata.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cancellation signal, deadline and peer metadata for one call.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    peer: Option<Arc<str>>,
    background: bool,
}

impl Context {
    /// A token that never fires.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            peer: None,
            background: true,
        }
    }

    /// A token that fires only when [`Context::cancel`] is called.
    pub fn with_cancel() -> Self {
        Self {
            background: false,
            ..Self::background()
        }
    }

    /// A token that fires after `timeout` or on [`Context::cancel`].
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that fires at `deadline` or on [`Context::cancel`].
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::with_cancel()
        }
    }

    /// Derives a token that fires with its parent or on its own cancel.
    /// The earlier of the two deadlines wins.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            peer: self.peer.clone(),
            background: false,
        }
    }

    /// Same as [`Context::child`] with a tighter timeout applied.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        let deadline = Instant::now() + timeout;
        child.deadline = Some(match child.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        child
    }

    /// Attaches the remote address as metadata.
    pub fn with_peer(mut self, peer: impl Into<Arc<str>>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Remote address this call targets, if an interceptor path set it.
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True for a token that can never fire.
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Fires the token. A no-op on a background token, which never fires;
    /// derive a [`Context::child`] to get a cancellable one.
    pub fn cancel(&self) {
        if !self.background {
            self.token.cancel();
        }
    }

    /// The token's error if it has already fired.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves with the token's error once it fires. Pending forever for
    /// a background token.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Error::Cancelled,
                    _ = sleep_until(deadline) => Error::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
