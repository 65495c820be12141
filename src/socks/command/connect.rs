//! CONNECT command

use super::{resolve, send_success, Connection, NetContext};
use crate::error::SocksError;
use crate::net::BufferedSocket;
use crate::socks::codec::CommandMessage;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Dial the requested target and report the outbound local address
///
/// Resolution failures become `HostUnreachable`, dial failures
/// `NetworkUnreachable`.
pub async fn handle_connect<S>(
    net: &NetContext,
    socket: &mut BufferedSocket<S>,
    request: &CommandMessage,
) -> Result<Connection>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ip = resolve(net.resolver.as_ref(), &request.addr)
        .await
        .map_err(SocksError::from)?;
    let target = SocketAddr::new(ip, request.port);

    debug!("Connecting to target: {}", target);
    let stream = net
        .connector
        .dial(target)
        .await
        .map_err(SocksError::from)?;

    let local_addr = stream
        .local_addr()
        .context("Failed to get outbound local address")?;
    send_success(socket, local_addr).await?;

    info!("SOCKS5 tunnel established to {}", target);
    Ok(Connection::Tcp(stream))
}
