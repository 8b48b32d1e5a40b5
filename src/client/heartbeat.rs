//! Heartbeat monitor
//!
//! Probes the server on a fixed interval with an empty call and hands the
//! outcome to a [`PingHandler`]. Probes go through the same session as
//! regular calls but skip the interceptors.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::client::options::Heartbeat;
use crate::client::{Client, Inner};
use crate::context::Context;
use crate::error::Result;

/// Deadline for a single probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Decides what to do with each probe result.
#[async_trait]
pub trait PingHandler: Send + Sync {
    async fn handle(&self, result: Result<()>, client: &Client);
}

/// Default policy: ignore success, log ordinary failures, and reconnect
/// when the probe reports the session is shut down.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconnectOnShutdown;

#[async_trait]
impl PingHandler for ReconnectOnShutdown {
    async fn handle(&self, result: Result<()>, client: &Client) {
        let Err(err) = result else {
            return;
        };
        if !err.is_shutdown() {
            client.logger().error(&format!("[error][rax-rpc]: ping: {err}"));
            return;
        }
        if let Err(e) = client.reconnect().await {
            client
                .logger()
                .error(&format!("[error][rax-rpc]: reconnect: {e}"));
        }
    }
}

/// Spawns the monitor. It holds only a weak reference, so dropping every
/// clone of the client stops it, as does [`Client::close`].
pub(crate) fn spawn_monitor(client: &Client, heartbeat: Heartbeat) -> JoinHandle<()> {
    let weak = Arc::downgrade(&client.inner);
    tokio::spawn(monitor(weak, heartbeat))
}

async fn monitor(weak: Weak<Inner>, heartbeat: Heartbeat) {
    let mut ticker = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = weak.upgrade() else {
            debug!("Heartbeat stopped: client dropped");
            return;
        };
        let client = Client { inner };
        if client.is_closed().await {
            debug!("Heartbeat stopped: client closed");
            return;
        }

        let result = client.ping(&heartbeat.method).await;
        heartbeat.handler.handle(result, &client).await;
    }
}

impl Client {
    async fn ping(&self, method: &str) -> Result<()> {
        let ctx = Context::with_timeout(PING_TIMEOUT);
        self.dispatch_call(&ctx, method, json!({})).await.map(|_| ())
    }
}
