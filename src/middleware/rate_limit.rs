//! Rate limiting middleware
//!
//! Caps how many calls per method may leave the client within a sliding
//! window. Calls over the limit fail locally with
//! [`Error::RateLimited`] and never reach the session.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::client::{AsyncCallInterceptor, AsyncCallInvoker, CallInterceptor, CallInvoker};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::transport::Call;

/// Simple sliding-window rate limiter
pub struct RateLimiter {
    requests: HashMap<String, Vec<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn is_allowed(&mut self, key: &str) -> bool {
        let now = Instant::now();
        let entry = self.requests.entry(key.to_string()).or_default();

        // Forget requests that left the window
        entry.retain(|&time| now.duration_since(time) < self.window);

        if entry.len() < self.max_requests {
            entry.push(now);
            true
        } else {
            false
        }
    }
}

/// Interceptor that applies a [`RateLimiter`] keyed by method name.
pub struct RateLimitInterceptor {
    limiter: Mutex<RateLimiter>,
}

impl RateLimitInterceptor {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            limiter: Mutex::new(RateLimiter::new(max_requests, window)),
        }
    }

    /// Allows `per_second` calls per method each second.
    pub fn per_second(per_second: usize) -> Self {
        Self::new(per_second, Duration::from_secs(1))
    }

    async fn admit(&self, method: &str) -> Result<()> {
        if self.limiter.lock().await.is_allowed(method) {
            Ok(())
        } else {
            Err(Error::RateLimited(method.to_string()))
        }
    }
}

#[async_trait]
impl CallInterceptor for RateLimitInterceptor {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn CallInvoker,
    ) -> Result<Value> {
        self.admit(method).await?;
        invoker.invoke(ctx, method, args).await
    }
}

#[async_trait]
impl AsyncCallInterceptor for RateLimitInterceptor {
    async fn intercept(
        &self,
        ctx: &Context,
        method: &str,
        args: Value,
        invoker: &dyn AsyncCallInvoker,
    ) -> Call {
        match self.admit(method).await {
            Ok(()) => invoker.invoke(ctx, method, args).await,
            Err(e) => Call::ready(method, Err(e)),
        }
    }
}
