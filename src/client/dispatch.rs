//! Call dispatch
//!
//! Four entry points: blocking or asynchronous, each with and without a
//! cancellation token. The token-less forms are the token forms with
//! [`Context::background`]. Every path reads the current session once and
//! keeps using it, even if a concurrent `reconnect` swaps in a new one.
//!
//! When a token fires first, the caller gets the token's error right away.
//! The request already handed to the session is not aborted: its reply lands
//! in a one-shot slot nobody reads any more.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::client::Client;
use crate::client::interceptor::Dispatcher;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::transport::Call;

impl Client {
    /// Calls `method` and waits for the reply.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        self.call_with_cancellation(&Context::background(), method, args)
            .await
    }

    /// Calls `method` and waits for the reply or for `ctx` to fire,
    /// whichever comes first.
    pub async fn call_with_cancellation(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        match &self.inner.options.call_interceptor {
            Some(interceptor) => {
                let ctx = self.peer_context(ctx);
                interceptor
                    .intercept(&ctx, method, args, &Dispatcher::new(self))
                    .await
            }
            None => self.dispatch_call(ctx, method, args).await,
        }
    }

    /// Starts `method` and returns its handle without waiting for the reply.
    pub async fn async_call(&self, method: &str, args: Value) -> Call {
        self.async_call_with_cancellation(&Context::background(), method, args)
            .await
    }

    /// Starts `method`, giving up on handing it to the session if `ctx` fires
    /// first. In that case the returned call is already complete with the
    /// token's error.
    pub async fn async_call_with_cancellation(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
    ) -> Call {
        match &self.inner.options.async_call_interceptor {
            Some(interceptor) => {
                let ctx = self.peer_context(ctx);
                interceptor
                    .intercept(&ctx, method, args, &Dispatcher::new(self))
                    .await
            }
            None => self.dispatch_async(ctx, method, args).await,
        }
    }

    /// [`Client::call`] with typed arguments and reply.
    pub async fn call_typed<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call_with_cancellation_typed(&Context::background(), method, args)
            .await
    }

    /// [`Client::call_with_cancellation`] with typed arguments and reply.
    pub async fn call_with_cancellation_typed<A, R>(
        &self,
        ctx: &Context,
        method: &str,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let reply = self.call_with_cancellation(ctx, method, args).await?;
        Ok(serde_json::from_value(reply)?)
    }

    fn peer_context(&self, ctx: &Context) -> Context {
        ctx.clone().with_peer(Arc::clone(&self.inner.address))
    }

    pub(crate) async fn dispatch_call(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        let Some(session) = self.current_session() else {
            return Err(Error::Shutdown);
        };

        if ctx.is_background() {
            return session.go(method, args).await.await;
        }

        tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            result = async { session.go(method, args).await.await } => result,
        }
    }

    pub(crate) async fn dispatch_async(&self, ctx: &Context, method: &str, args: Value) -> Call {
        let Some(session) = self.current_session() else {
            return Call::ready(method, Err(Error::Shutdown));
        };

        if ctx.is_background() {
            return session.go(method, args).await;
        }

        // The handoff keeps running if the token wins; it finishes whenever
        // the session accepts the request and its call is then dropped.
        let (handed_off, handoff) = oneshot::channel();
        let owned_method = method.to_string();
        tokio::spawn(async move {
            let call = session.go(&owned_method, args).await;
            let _ = handed_off.send(call);
        });

        tokio::select! {
            biased;
            err = ctx.done() => Call::ready(method, Err(err)),
            handoff = handoff => match handoff {
                Ok(call) => call,
                Err(_) => Call::ready(method, Err(Error::Shutdown)),
            },
        }
    }
}
