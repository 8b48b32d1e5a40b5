//! Connection lifecycle
//!
//! `reconnect` and `close` are the only writers of the session slot. Both run
//! under the lifecycle lock, so at most one of them is changing the connection
//! at any time. Calls never take this lock.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::client::Client;
use crate::error::{Error, Result};

/// State guarded by the lifecycle lock.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    /// Whether `close` may forward to the held session. Cleared while
    /// `reconnect` closes a stale session itself.
    pub(crate) close_permitted: bool,
    /// Set by the first `close`; never cleared.
    pub(crate) closed: bool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            close_permitted: true,
            closed: false,
        }
    }
}

impl Client {
    /// Replaces the current session with a freshly dialed one.
    ///
    /// Fails with [`Error::Shutdown`] once the client is closed. A stale
    /// session is closed first; if that close fails for any reason other than
    /// the session already being shut down, the error is returned and the
    /// stale session stays in place. A dial failure leaves the client without
    /// a session.
    pub async fn reconnect(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.lifecycle.lock().await;

        if state.closed {
            return Err(Error::Shutdown);
        }

        if let Some(stale) = inner.session.load_full() {
            state.close_permitted = false;
            match stale.close().await {
                Ok(()) | Err(Error::Shutdown) => {}
                Err(e) => {
                    warn!("Failed to close stale session to {}: {}", inner.address, e);
                    return Err(e);
                }
            }
            inner.session.store(None);
            debug!("Closed stale session to {}", inner.address);
        }

        let session = inner
            .options
            .connector
            .connect(inner.network, &inner.address, inner.options.timeout)
            .await?;

        state.close_permitted = true;
        inner.session.store(Some(Arc::new(session)));
        info!("Connected to {} {}", inner.network, inner.address);
        Ok(())
    }

    /// Shuts the client down for good.
    ///
    /// Returns [`Error::Shutdown`] when there is no session to close. When
    /// `reconnect` already closed the held session, returns `Ok` without
    /// closing it twice. Otherwise returns the session's close result.
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.lifecycle.lock().await;

        state.closed = true;
        let permitted = std::mem::replace(&mut state.close_permitted, true);

        let Some(session) = inner.session.swap(None) else {
            return Err(Error::Shutdown);
        };
        if !permitted {
            return Ok(());
        }

        let result = session.close().await;
        match &result {
            Ok(()) => info!("Closed connection to {}", inner.address),
            Err(Error::Shutdown) => {}
            Err(e) => warn!("Failed to close connection to {}: {}", inner.address, e),
        }
        result
    }

    /// Whether [`Client::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.inner.lifecycle.lock().await.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DialOptions;
    use crate::client::tests::dial_fake;
    use crate::transport::testutil::FakeConnector;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn reconnect_replaces_and_closes_the_stale_session() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;
        let first = connector.last();

        client.reconnect().await.unwrap();

        assert_eq!(connector.dials(), 2);
        assert!(first.is_closed());
        assert!(!connector.last().is_closed());
        assert_eq!(client.call("Echo", json!(1)).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn reconnect_tolerates_an_already_shut_down_session() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;
        connector.last().sever();

        client.reconnect().await.unwrap();
        assert_eq!(client.call("Echo", json!("x")).await.unwrap(), json!("x"));
    }

    #[tokio::test]
    async fn reconnect_aborts_on_close_error_and_keeps_the_session() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;
        connector.last().fail_next_close();

        assert!(matches!(client.reconnect().await, Err(Error::Close(_))));
        assert_eq!(connector.dials(), 1);
        assert!(client.is_connected());

        // The failed housekeeping close consumed the close permission.
        client.close().await.unwrap();
        assert!(!connector.last().is_closed());
    }

    #[tokio::test]
    async fn failed_dial_leaves_no_session() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;
        connector.refuse(true);

        assert!(matches!(client.reconnect().await, Err(Error::Dial { .. })));
        assert!(!client.is_connected());
        assert!(client.call("Echo", Value::Null).await.unwrap_err().is_shutdown());

        connector.refuse(false);
        client.reconnect().await.unwrap();
        assert!(client.call("Echo", Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn close_twice_reports_shutdown_the_second_time() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;

        client.close().await.unwrap();
        assert!(connector.last().is_closed());
        assert!(client.close().await.unwrap_err().is_shutdown());
        assert!(client.is_closed().await);
    }

    #[tokio::test]
    async fn closed_client_never_reconnects_and_fails_calls() {
        let connector = Arc::new(FakeConnector::default());
        let client = dial_fake(&connector, DialOptions::new().block()).await;
        client.close().await.unwrap();

        assert!(client.reconnect().await.unwrap_err().is_shutdown());
        assert_eq!(connector.dials(), 1);
        assert!(client.call("Echo", Value::Null).await.unwrap_err().is_shutdown());
        let call = client.async_call("Echo", Value::Null).await;
        assert!(call.await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn close_without_session_is_shutdown() {
        let connector = Arc::new(FakeConnector::default());
        connector.refuse(true);
        let client = dial_fake(&connector, DialOptions::new()).await;
        assert!(client.close().await.unwrap_err().is_shutdown());
    }
}
