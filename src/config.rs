//! Configuration management for the RAX RPC client
//!
//! Settings come from an optional `rax-rpc.toml` overlaid by `RAX_RPC_*`
//! environment variables, e.g. `RAX_RPC_ADDRESS=10.0.0.5:8972`.

use std::sync::Arc;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::client::DialOptions;
use crate::middleware::RateLimitInterceptor;
use crate::transport::Network;

/// Client configuration as read from file and environment
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// `tcp`, `tcp4`, `tcp6` or `unix`
    #[serde(default = "default_network")]
    pub network: String,

    /// Server address, `host:port` or a socket path
    pub address: String,

    /// Connect timeout, also used as the call deadline by the CLI
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait for the first connect before returning from dial
    #[serde(default)]
    pub block: bool,

    /// Method probed by the heartbeat; probing is off when unset
    #[serde(default)]
    pub heartbeat_method: Option<String>,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Per-method call cap per second; unlimited when unset
    #[serde(default)]
    pub rate_limit_per_sec: Option<usize>,
}

fn default_network() -> String {
    "tcp".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_ms() -> u64 {
    500
}

impl ClientConfig {
    /// Load configuration from `rax-rpc.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("rax-rpc")
    }

    /// Load configuration from the given file stem or path (optional) with
    /// environment overrides
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::with_name(path).required(false)))
    }

    pub(crate) fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings = builder
            .add_source(Environment::with_prefix("RAX_RPC").try_parsing(true))
            .build()?;
        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::Message("address cannot be empty".into()));
        }

        if self.network.parse::<Network>().is_err() {
            return Err(ConfigError::Message(format!(
                "unknown network: {}",
                self.network
            )));
        }

        if self.rate_limit_per_sec == Some(0) {
            return Err(ConfigError::Message(
                "rate_limit_per_sec must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get connect timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Build dial options matching this configuration
    pub fn to_options(&self) -> DialOptions {
        let mut options = DialOptions::new().timeout(self.timeout());

        if self.block {
            options = options.block();
        }

        if let Some(method) = &self.heartbeat_method {
            options = options.heartbeat(method.clone(), self.heartbeat_interval(), None);
        }

        if let Some(limit) = self.rate_limit_per_sec {
            let limiter = Arc::new(RateLimitInterceptor::per_second(limit));
            options = options
                .call_interceptor(Arc::clone(&limiter) as Arc<dyn crate::client::CallInterceptor>)
                .async_call_interceptor(limiter);
        }

        options
    }
}
