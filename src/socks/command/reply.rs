//! SOCKS5 reply builder

use crate::net::BufferedSocket;
use crate::socks::codec::CommandMessage;
use anyhow::Result;
use std::net::SocketAddr;
use tokio::io::AsyncWrite;

/// Send a success reply reporting `bound`
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub async fn send_success<S>(socket: &mut BufferedSocket<S>, bound: SocketAddr) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let reply = CommandMessage::success(bound).to_bytes();
    socket.write(&reply).await?;
    Ok(())
}
