//! RAX RPC - command-line probe
//!
//! Calls one method on the configured server and prints the reply:
//!
//! ```text
//! RAX_RPC_ADDRESS=127.0.0.1:8972 rax-rpc Arith.Multiply '{"a":6,"b":7}'
//! ```

use log::{info, warn};
use serde_json::Value;

use rax_rpc_client::config::ClientConfig;
use rax_rpc_client::error::handlers::{error_to_exit_code, handle_error};
use rax_rpc_client::{Context, Result, dial};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(method) = args.next() else {
        eprintln!("usage: rax-rpc <method> [json-params]");
        std::process::exit(2);
    };
    let params = args.next();

    if let Err(e) = run(&method, params.as_deref()).await {
        handle_error(&e);
        std::process::exit(error_to_exit_code(&e));
    }
}

async fn run(method: &str, params: Option<&str>) -> Result<()> {
    let config = ClientConfig::load()?;
    let params = match params {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };

    info!("Dialing {} {}", config.network, config.address);
    let client = dial(&config.network, &config.address, config.to_options().block()).await?;

    let ctx = Context::with_timeout(config.timeout());
    let reply = client.call_with_cancellation(&ctx, method, params).await;

    if let Err(e) = client.close().await {
        warn!("Close failed: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&reply?)?);
    Ok(())
}
