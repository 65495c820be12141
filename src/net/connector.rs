//! Dial/listen collaborator
//!
//! Creates outbound TCP connections, BIND listeners and UDP ASSOCIATE
//! sockets on behalf of the command handlers.

use crate::config::TcpConfig;
use crate::error::NetError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Socket options applied to outbound connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Factory for the sockets a SOCKS5 command needs
#[async_trait]
pub trait Connector: Debug + Send + Sync {
    /// Open a TCP connection to `addr`
    async fn dial(&self, addr: SocketAddr) -> Result<TcpStream, NetError>;

    /// Listen on `ip`, with an ephemeral port when `port` is `None`
    async fn listen(&self, ip: IpAddr, port: Option<u16>) -> Result<TcpListener, NetError>;

    /// Bind a UDP socket on `ip`, with an ephemeral port when `port` is `None`
    async fn bind_udp(&self, ip: IpAddr, port: Option<u16>) -> Result<UdpSocket, NetError>;
}

/// Connector using plain tokio sockets
#[derive(Debug, Clone, Default)]
pub struct DirectConnector {
    socket_opts: SocketOpts,
}

impl DirectConnector {
    /// Create a connector applying `socket_opts` to dialed streams
    pub fn new(socket_opts: SocketOpts) -> Self {
        DirectConnector { socket_opts }
    }
}

#[async_trait]
impl Connector for DirectConnector {
    async fn dial(&self, addr: SocketAddr) -> Result<TcpStream, NetError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| NetError::Connect {
                addr: addr.to_string(),
                source,
            })?;

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", addr);
        Ok(stream)
    }

    async fn listen(&self, ip: IpAddr, port: Option<u16>) -> Result<TcpListener, NetError> {
        let addr = SocketAddr::new(ip, port.unwrap_or(0));
        TcpListener::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                addr: addr.to_string(),
                source,
            })
    }

    async fn bind_udp(&self, ip: IpAddr, port: Option<u16>) -> Result<UdpSocket, NetError> {
        let addr = SocketAddr::new(ip, port.unwrap_or(0));
        UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                addr: addr.to_string(),
                source,
            })
    }
}
