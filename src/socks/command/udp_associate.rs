//! UDP ASSOCIATE command
//!
//! Binds a datagram socket on the server address and returns an
//! [`UdpAssociation`], which decides where every datagram received on that
//! socket goes next.

use super::{resolve, send_success, AddrMatcher, Connection, NetContext};
use crate::error::SocksError;
use crate::net::{BufferedSocket, Resolver};
use crate::socks::codec::{CommandMessage, UdpHeader};
use crate::socks::types::{Address, Session};
use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Bind the association socket and reply with its address
pub async fn handle_udp_associate<S>(
    net: &NetContext,
    socket: &mut BufferedSocket<S>,
    session: &Session,
    request: &CommandMessage,
) -> Result<Connection>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = AddrMatcher::resolve(net.resolver.as_ref(), &request.addr, request.port)
        .await
        .map_err(SocksError::from)?;

    let udp = net
        .connector
        .bind_udp(session.server_addr.ip(), None)
        .await
        .map_err(SocksError::from)?;
    let bound = udp
        .local_addr()
        .context("Failed to get UDP relay address")?;

    send_success(socket, bound).await?;
    info!("UDP association on {} for {}:{}", bound, request.addr, request.port);

    Ok(Connection::Udp(UdpAssociation::new(
        udp,
        client,
        net.resolver.clone(),
    )))
}

/// Datagram socket plus the routing state of one association
#[derive(Debug)]
pub struct UdpAssociation {
    socket: UdpSocket,
    client: AddrMatcher,
    /// Source of the most recent client-side datagram
    last_client: Option<SocketAddr>,
    resolver: Arc<dyn Resolver>,
}

impl UdpAssociation {
    /// Create an association; `client` identifies client-side senders
    pub fn new(socket: UdpSocket, client: AddrMatcher, resolver: Arc<dyn Resolver>) -> Self {
        UdpAssociation {
            socket,
            client,
            last_client: None,
            resolver,
        }
    }

    /// The association socket
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Decide where a datagram received from `from` must be sent.
    ///
    /// Client-side datagrams are unwrapped and go to their header's
    /// destination. Remote-side datagrams are wrapped in a header naming the
    /// remote and go to the client. `None` means drop.
    pub async fn route(&mut self, datagram: Bytes, from: SocketAddr) -> Option<(SocketAddr, Bytes)> {
        if self.client.matches(from) {
            self.last_client = Some(from);
            self.route_from_client(datagram, from).await
        } else {
            self.route_from_remote(datagram, from)
        }
    }

    async fn route_from_client(
        &self,
        mut datagram: Bytes,
        from: SocketAddr,
    ) -> Option<(SocketAddr, Bytes)> {
        let header = match UdpHeader::decode(&mut datagram) {
            Ok(header) => header,
            Err(e) => {
                warn!("Invalid SOCKS5 UDP datagram from {}: {}", from, e);
                return None;
            }
        };

        if header.is_fragmented() {
            debug!("Fragmented UDP datagram from {}, dropping", from);
            return None;
        }

        let ip = match resolve(self.resolver.as_ref(), &header.addr).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Failed to resolve UDP target {}: {}", header.addr, e);
                return None;
            }
        };

        Some((SocketAddr::new(ip, header.port), datagram))
    }

    fn route_from_remote(&self, datagram: Bytes, from: SocketAddr) -> Option<(SocketAddr, Bytes)> {
        let dest = match self.client.endpoint().or(self.last_client) {
            Some(dest) => dest,
            None => {
                warn!("UDP datagram from {} before any client datagram, dropping", from);
                return None;
            }
        };

        let header = UdpHeader::new(Address::from(from.ip()), from.port());
        let mut buf = BytesMut::with_capacity(datagram.len() + 22);
        header.encode(&mut buf);
        buf.extend_from_slice(&datagram);

        Some((dest, buf.freeze()))
    }
}
