//! Client middleware
//!
//! Ready-made interceptors for logging and rate limiting.

pub mod logging;
pub mod rate_limit;

pub use logging::LoggingInterceptor;
pub use rate_limit::{RateLimitInterceptor, RateLimiter};
