//! Interceptors
//!
//! Optional hooks wrapped around the cancellation-aware entry points. An
//! interceptor sees the call's token (carrying the remote address as
//! [`Context::peer`]), the method and the arguments, plus an invoker for the
//! underlying dispatcher. It may rewrite the arguments, retry, log, or answer
//! without invoking anything, as long as it returns what the un-intercepted
//! entry point would.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::Client;
use crate::context::Context;
use crate::error::Result;
use crate::transport::Call;

/// Handle to the blocking dispatcher, passed to a [`CallInterceptor`].
#[async_trait]
pub trait CallInvoker: Send + Sync {
    async fn invoke(&self, ctx: &Context, method: &str, args: Value) -> Result<Value>;
}

/// Handle to the asynchronous dispatcher, passed to an [`AsyncCallInterceptor`].
#[async_trait]
pub trait AsyncCallInvoker: Send + Sync {
    async fn invoke(&self, ctx: &Context, method: &str, args: Value) -> Call;
}

/// Wraps [`Client::call`] and [`Client::call_with_cancellation`].
#[async_trait]
pub trait CallInterceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn CallInvoker,
    ) -> Result<Value>;
}

/// Wraps [`Client::async_call`] and [`Client::async_call_with_cancellation`].
#[async_trait]
pub trait AsyncCallInterceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn AsyncCallInvoker,
    ) -> Call;
}

/// Invoker backed by the client's own dispatch paths.
pub(crate) struct Dispatcher<'a> {
    client: &'a Client,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallInvoker for Dispatcher<'_> {
    async fn invoke(&self, ctx: &Context, method: &str, args: Value) -> Result<Value> {
        self.client.dispatch_call(ctx, method, args).await
    }
}

#[async_trait]
impl AsyncCallInvoker for Dispatcher<'_> {
    async fn invoke(&self, ctx: &Context, method: &str, args: Value) -> Call {
        self.client.dispatch_async(ctx, method, args).await
    }
}
