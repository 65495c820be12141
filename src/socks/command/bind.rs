//! BIND command
//!
//! Opens a listener on the server address, announces it, and waits for the
//! inbound connection the client declared in its request. Other peers are
//! closed as they arrive. The listener is dropped as soon as the client's
//! control stream ends.

use super::{send_success, AddrMatcher, Connection, NetContext};
use crate::error::SocksError;
use crate::net::BufferedSocket;
use crate::socks::codec::CommandMessage;
use crate::socks::types::Session;
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Listen, reply twice, and hand back the matching inbound stream
pub async fn handle_bind<S>(
    net: &NetContext,
    socket: &mut BufferedSocket<S>,
    session: &Session,
    request: &CommandMessage,
) -> Result<Connection>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let expected = AddrMatcher::resolve(net.resolver.as_ref(), &request.addr, request.port)
        .await
        .map_err(SocksError::from)?;

    let listener = net
        .connector
        .listen(session.server_addr.ip(), None)
        .await
        .map_err(SocksError::from)?;
    let bound = listener
        .local_addr()
        .context("Failed to get BIND listener address")?;

    send_success(socket, bound).await?;
    debug!("BIND listening on {} for {}:{}", bound, request.addr, request.port);

    // Bytes the client sends meanwhile stay buffered for the relay
    let (stream, peer) = loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("Failed to accept BIND connection")?;
                if expected.matches(peer) {
                    break (stream, peer);
                }
                warn!("Rejected BIND peer {} on {}", peer, bound);
            }
            watched = socket.fill_more() => {
                watched.with_context(|| {
                    format!("Control channel closed while BIND waited on {}", bound)
                })?;
            }
        }
    };
    drop(listener);

    send_success(socket, peer).await?;
    info!("BIND accepted {} on {}", peer, bound);

    Ok(Connection::Tcp(stream))
}
