//! Relay layer
//!
//! Once a command has produced a [`Connection`] the handshake is over and the
//! client stream is handed here for good: spliced with a target stream, or
//! used as the control channel of a UDP association.

use super::command::{Connection, UdpAssociation};
use super::consts::MAX_UDP_PACKET;
use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Relay between the client stream and the command's connection
pub async fn relay<S>(client: S, leftover: Bytes, connection: Connection) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match connection {
        Connection::Tcp(target) => relay_tcp(client, leftover, target).await,
        Connection::Udp(association) => relay_udp(client, association).await,
    }
}

/// Relay data bidirectionally between two streams
///
/// `leftover` holds client bytes that arrived along with the handshake and
/// is written to `b` first. Each direction shuts down its destination's
/// write side on EOF; the relay returns once both directions finished, or on
/// the first error.
pub async fn relay_tcp<A, B>(a: A, leftover: Bytes, mut b: B) -> Result<()>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    if !leftover.is_empty() {
        b.write_all(&leftover)
            .await
            .context("Failed to forward buffered client data")?;
    }

    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = async {
        let n = tokio::io::copy(&mut a_read, &mut b_write).await?;
        b_write.shutdown().await?;
        Ok::<_, std::io::Error>(n)
    };
    let b_to_a = async {
        let n = tokio::io::copy(&mut b_read, &mut a_write).await?;
        a_write.shutdown().await?;
        Ok::<_, std::io::Error>(n)
    };

    let (sent, received) = tokio::try_join!(a_to_b, b_to_a)?;
    debug!(
        "TCP relay finished: {} bytes sent, {} bytes received",
        sent + leftover.len() as u64,
        received
    );

    Ok(())
}

/// Run a UDP association until its control stream ends
///
/// Bytes arriving on the control stream are discarded. Per-datagram failures
/// are logged and skipped; a receive error on the socket ends the relay.
pub async fn relay_udp<S>(mut control: S, mut association: UdpAssociation) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut recv_buf = vec![0u8; MAX_UDP_PACKET];
    let mut control_buf = [0u8; 512];

    loop {
        tokio::select! {
            read = control.read(&mut control_buf) => {
                match read.context("UDP control channel failed")? {
                    0 => {
                        debug!("UDP control channel closed");
                        return Ok(());
                    }
                    n => debug!("Ignoring {} bytes on UDP control channel", n),
                }
            }
            received = association.socket().recv_from(&mut recv_buf) => {
                let (len, from) = received.context("UDP receive failed")?;
                let datagram = Bytes::copy_from_slice(&recv_buf[..len]);

                if let Some((dest, payload)) = association.route(datagram, from).await {
                    match association.socket().send_to(&payload, dest).await {
                        Ok(n) => debug!("UDP relay: {} bytes from {} to {}", n, from, dest),
                        Err(e) => warn!("UDP send to {} failed: {}", dest, e),
                    }
                }
            }
        }
    }
}
