//! Module `dialer`
//!
//! Opens network connections for the client and wraps them in an
//! [`RpcSession`].

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpStream, lookup_host};

use crate::error::{Error, Result};
use crate::transport::{Connector, RpcSession, Session};

/// Keep-alive probe interval set on every TCP connection.
pub const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Network families accepted by [`crate::dial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Tcp4,
    Tcp6,
    #[cfg(unix)]
    Unix,
}

impl Network {
    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
            _ => true,
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            #[cfg(unix)]
            "unix" => Ok(Network::Unix),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            #[cfg(unix)]
            Network::Unix => "unix",
        };
        f.write_str(name)
    }
}

/// Default connector: TCP (v4/v6) and Unix sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetConnector;

#[async_trait]
impl Connector for NetConnector {
    async fn connect(
        &self,
        network: Network,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        let dial_error = |source| Error::Dial {
            address: address.to_string(),
            source,
        };

        match tokio::time::timeout(timeout, open(network, address)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(dial_error(e)),
            Err(_) => Err(dial_error(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("i/o timeout after {timeout:?}"),
            ))),
        }
    }
}

async fn open(network: Network, address: &str) -> io::Result<Box<dyn Session>> {
    match network {
        #[cfg(unix)]
        Network::Unix => {
            let stream = tokio::net::UnixStream::connect(address).await?;
            Ok(Box::new(RpcSession::new(stream)))
        }
        _ => {
            let stream = connect_tcp(network, address).await?;
            Ok(Box::new(RpcSession::new(stream)))
        }
    }
}

/// Tries every resolved address of the right family in order.
async fn connect_tcp(network: Network, address: &str) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in lookup_host(address).await? {
        if !network.accepts(&addr) {
            continue;
        }
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                configure(&stream)?;
                debug!("Connected to {} via {}", address, addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {network} address found for {address}"),
        )
    }))
}

fn configure(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let keepalive = TcpKeepalive::new().with_time(KEEP_ALIVE);
    #[cfg(any(
        target_os = "android",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "netbsd",
        target_os = "windows",
    ))]
    let keepalive = keepalive.with_interval(KEEP_ALIVE);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
