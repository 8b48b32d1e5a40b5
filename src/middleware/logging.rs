//! Logging middleware
//!
//! Logs every call with its target and how long it took.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use tokio::time::Instant;

use crate::client::{AsyncCallInterceptor, AsyncCallInvoker, CallInterceptor, CallInvoker};
use crate::context::Context;
use crate::error::Result;
use crate::transport::Call;

/// Logs calls through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInterceptor;

#[async_trait]
impl CallInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn CallInvoker,
    ) -> Result<Value> {
        let peer = ctx.peer().unwrap_or("unknown");
        let started = Instant::now();
        let result = invoker.invoke(ctx, method, args).await;
        match &result {
            Ok(_) => info!("Call {} to {} took {:?}", method, peer, started.elapsed()),
            Err(e) => warn!(
                "Call {} to {} failed after {:?}: {}",
                method,
                peer,
                started.elapsed(),
                e
            ),
        }
        result
    }
}

#[async_trait]
impl AsyncCallInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn AsyncCallInvoker,
    ) -> Call {
        info!(
            "Starting async call {} to {}",
            method,
            ctx.peer().unwrap_or("unknown")
        );
        invoker.invoke(ctx, method, args).await
    }
}
