//! SOCKS5 wire codec
//!
//! Method negotiation, command negotiation and UDP datagram header formats.
//! Stream messages are read from a [`BufferedSocket`] one field at a time so
//! that nothing past the end of a message is consumed.

use super::consts::*;
use super::types::Address;
use crate::error::{SocksError, SocksErrorKind};
use crate::net::BufferedSocket;
use anyhow::{bail, Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::AsyncRead;

/// Method negotiation request
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRequest {
    /// Offered method IDs, in client order
    pub methods: Vec<u8>,
}

impl MethodRequest {
    /// Read a method request, rejecting any version other than 5
    pub async fn read_from<S>(socket: &mut BufferedSocket<S>) -> Result<Self>
    where
        S: AsyncRead + Unpin,
    {
        let version = socket.read_u8().await?;
        if version != SOCKS5_VERSION {
            return Err(SocksError::new(SocksErrorKind::IncorrectVersion)
                .with_message(format!("Unsupported SOCKS version: {}", version))
                .into());
        }

        let nmethods = socket.read_u8().await? as usize;
        let methods = socket.read(nmethods).await?;

        Ok(MethodRequest {
            methods: methods.to_vec(),
        })
    }

    /// Encode the request
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.methods.len());
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.methods.len() as u8);
        buf.put_slice(&self.methods);
        buf.freeze()
    }
}

/// Method negotiation reply: `[VER][METHOD]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodReply {
    /// Chosen method ID
    pub method: u8,
}

impl MethodReply {
    /// Create a reply choosing `method`
    pub fn new(method: u8) -> Self {
        MethodReply { method }
    }

    /// Encode the reply
    pub fn to_bytes(self) -> [u8; 2] {
        [SOCKS5_VERSION, self.method]
    }
}

/// Command negotiation request or reply
///
/// ```text
/// +----+---------+----------+------+----------+----------+
/// |VER | CMD/REP | RSV/FRAG | ATYP | DST.ADDR | DST.PORT |
/// +----+---------+----------+------+----------+----------+
/// | 1  |    1    |    1     |  1   | Variable |    2     |
/// +----+---------+----------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    /// Command code in a request, reply code in a reply
    pub code: u8,
    /// Reserved byte
    pub rsv: u8,
    /// Target (request) or bound (reply) address
    pub addr: Address,
    /// Port
    pub port: u16,
}

impl CommandMessage {
    /// Create a request for `cmd`
    pub fn request(cmd: u8, addr: Address, port: u16) -> Self {
        CommandMessage {
            code: cmd,
            rsv: SOCKS5_RESERVED,
            addr,
            port,
        }
    }

    /// Create a success reply reporting `bound`
    pub fn success(bound: SocketAddr) -> Self {
        CommandMessage {
            code: SOCKS5_REPLY_SUCCEEDED,
            rsv: SOCKS5_RESERVED,
            addr: Address::from(bound.ip()),
            port: bound.port(),
        }
    }

    /// Read a command message field by field
    pub async fn read_from<S>(socket: &mut BufferedSocket<S>) -> Result<Self>
    where
        S: AsyncRead + Unpin,
    {
        let version = socket.read_u8().await?;
        if version != SOCKS5_VERSION {
            return Err(SocksError::new(SocksErrorKind::IncorrectVersion)
                .with_message(format!("Unsupported SOCKS version in command: {}", version))
                .into());
        }

        let code = socket.read_u8().await?;
        let rsv = socket.read_u8().await?;
        let atyp = socket.read_u8().await?;
        let addr = read_address(socket, atyp).await?;
        let port_buf = socket.read(2).await?;
        let port = u16::from_be_bytes([port_buf[0], port_buf[1]]);

        Ok(CommandMessage {
            code,
            rsv,
            addr,
            port,
        })
    }

    /// Append the encoded message to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(3 + self.addr.encoded_len() + 2);
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.code);
        buf.put_u8(self.rsv);
        self.addr.encode(buf);
        buf.put_u16(self.port);
    }

    /// Encode the message
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

async fn read_address<S>(socket: &mut BufferedSocket<S>, atyp: u8) -> Result<Address>
where
    S: AsyncRead + Unpin,
{
    match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let octets = socket.read(IPV4_ADDR_LEN).await?;
            let mut ip = [0u8; IPV4_ADDR_LEN];
            ip.copy_from_slice(&octets);
            Ok(Address::Ipv4(Ipv4Addr::from(ip)))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = socket.read_u8().await? as usize;
            let name = socket.read(len).await?;
            let domain =
                String::from_utf8(name.to_vec()).with_context(|| "Invalid UTF-8 in domain name")?;
            Ok(Address::Domain(domain))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let octets = socket.read(IPV6_ADDR_LEN).await?;
            let mut ip = [0u8; IPV6_ADDR_LEN];
            ip.copy_from_slice(&octets);
            Ok(Address::Ipv6(Ipv6Addr::from(ip)))
        }

        _ => Err(SocksError::new(SocksErrorKind::AddressTypeNotAllowed)
            .with_message(format!("Unsupported address type: {}", atyp))
            .into()),
    }
}

/// Header prefixed to every relayed UDP datagram
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    /// Fragment number, 0 for standalone datagrams
    pub frag: u8,
    /// Destination (client to remote) or source (remote to client) address
    pub addr: Address,
    /// Port
    pub port: u16,
}

impl UdpHeader {
    /// Create an unfragmented header
    pub fn new(addr: Address, port: u16) -> Self {
        UdpHeader { frag: 0, addr, port }
    }

    /// Whether this datagram is a fragment
    pub fn is_fragmented(&self) -> bool {
        self.frag != 0
    }

    /// Split the header off the front of `datagram`, leaving the payload
    pub fn decode(datagram: &mut Bytes) -> Result<Self> {
        if datagram.remaining() < 4 {
            bail!("UDP datagram too short: {} bytes", datagram.remaining());
        }

        // RSV is ignored
        datagram.advance(2);
        let frag = datagram.get_u8();
        let atyp = datagram.get_u8();

        let addr = match atyp {
            SOCKS5_ADDR_TYPE_IPV4 => {
                ensure_remaining(datagram, IPV4_ADDR_LEN + 2, "IPv4 address")?;
                let mut ip = [0u8; IPV4_ADDR_LEN];
                datagram.copy_to_slice(&mut ip);
                Address::Ipv4(Ipv4Addr::from(ip))
            }

            SOCKS5_ADDR_TYPE_DOMAIN => {
                ensure_remaining(datagram, 1, "domain length")?;
                let len = datagram.get_u8() as usize;
                ensure_remaining(datagram, len + 2, "domain name")?;
                let name = datagram.split_to(len);
                let domain = String::from_utf8(name.to_vec())
                    .with_context(|| "Invalid UTF-8 in domain")?;
                Address::Domain(domain)
            }

            SOCKS5_ADDR_TYPE_IPV6 => {
                ensure_remaining(datagram, IPV6_ADDR_LEN + 2, "IPv6 address")?;
                let mut ip = [0u8; IPV6_ADDR_LEN];
                datagram.copy_to_slice(&mut ip);
                Address::Ipv6(Ipv6Addr::from(ip))
            }

            _ => bail!("Unknown address type: {}", atyp),
        };

        let port = datagram.get_u16();

        Ok(UdpHeader { frag, addr, port })
    }

    /// Append the encoded header to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(3 + self.addr.encoded_len() + 2);
        buf.put_u16(0);
        buf.put_u8(self.frag);
        self.addr.encode(buf);
        buf.put_u16(self.port);
    }
}

fn ensure_remaining(buf: &Bytes, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        bail!("UDP datagram too short for {}", what);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn socket(bytes: &[u8]) -> BufferedSocket<Cursor<Vec<u8>>> {
        BufferedSocket::new(Cursor::new(bytes.to_vec()))
    }

    async fn round_trip(message: CommandMessage) {
        let encoded = message.to_bytes();
        let mut socket = socket(&encoded);
        let decoded = CommandMessage::read_from(&mut socket).await.unwrap();
        assert_eq!(decoded, message);
        assert_eq!(socket.buffered(), 0);
    }

    #[tokio::test]
    async fn test_command_round_trip_ipv4() {
        round_trip(CommandMessage::request(
            SOCKS5_CMD_TCP_CONNECT,
            Address::Ipv4(Ipv4Addr::new(192, 168, 1, 1)),
            8080,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_command_round_trip_ipv6() {
        round_trip(CommandMessage::request(
            SOCKS5_CMD_UDP_ASSOCIATE,
            Address::Ipv6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
            443,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_command_round_trip_domain() {
        round_trip(CommandMessage::request(
            SOCKS5_CMD_TCP_BIND,
            Address::Domain("example.com".to_string()),
            80,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_command_read_leaves_trailing_bytes() {
        let mut bytes = vec![5, 1, 0, 1, 127, 0, 0, 1, 0x1F, 0x90];
        bytes.extend_from_slice(b"GET /");
        let mut socket = socket(&bytes);

        let message = CommandMessage::read_from(&mut socket).await.unwrap();
        assert_eq!(message.code, SOCKS5_CMD_TCP_CONNECT);
        assert_eq!(message.addr, Address::Ipv4(Ipv4Addr::LOCALHOST));
        assert_eq!(message.port, 8080);
        assert_eq!(socket.buffered(), 5);
    }

    #[tokio::test]
    async fn test_command_unknown_address_type() {
        let mut socket = socket(&[5, 1, 0, 0x02, 1, 2, 3, 4, 0, 80]);
        let err = CommandMessage::read_from(&mut socket).await.unwrap_err();
        let socks = err.downcast_ref::<SocksError>().unwrap();
        assert_eq!(socks.kind(), SocksErrorKind::AddressTypeNotAllowed);
    }

    #[tokio::test]
    async fn test_method_request_read() {
        let mut socket = socket(&[5, 2, 0x00, 0x02]);
        let request = MethodRequest::read_from(&mut socket).await.unwrap();
        assert_eq!(request.methods, vec![0x00, 0x02]);
        assert_eq!(&request.to_bytes()[..], &[5, 2, 0x00, 0x02]);
    }

    #[tokio::test]
    async fn test_method_request_bad_version() {
        let mut socket = socket(&[4, 1, 0x00]);
        let err = MethodRequest::read_from(&mut socket).await.unwrap_err();
        let socks = err.downcast_ref::<SocksError>().unwrap();
        assert_eq!(socks.kind(), SocksErrorKind::IncorrectVersion);
        assert!(socks.reply().is_empty());
    }

    #[test]
    fn test_method_reply() {
        assert_eq!(MethodReply::new(0x02).to_bytes(), [5, 2]);
    }

    #[test]
    fn test_success_reply_bytes() {
        let reply = CommandMessage::success("10.0.0.1:9090".parse().unwrap()).to_bytes();
        assert_eq!(&reply[..], &[5, 0, 0, 1, 10, 0, 0, 1, 0x23, 0x82]);
    }

    #[test]
    fn test_udp_header_decode() {
        let mut datagram = Bytes::from_static(&[0, 0, 0, 1, 10, 0, 0, 1, 0, 53, b'h', b'i']);
        let header = UdpHeader::decode(&mut datagram).unwrap();

        assert_eq!(header.frag, 0);
        assert_eq!(header.addr, Address::Ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(header.port, 53);
        assert_eq!(&datagram[..], b"hi");
    }

    #[test]
    fn test_udp_header_encode_domain() {
        let header = UdpHeader::new(Address::Domain("test.com".to_string()), 443);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        // RSV (2) + FRAG (1) + ATYP (1) + LEN (1) + DOMAIN (8) + PORT (2)
        assert_eq!(buf.len(), 15);
        assert_eq!(&buf[0..3], &[0, 0, 0]);
        assert_eq!(buf[3], SOCKS5_ADDR_TYPE_DOMAIN);
        assert_eq!(&buf[5..13], b"test.com");

        let mut datagram = buf.freeze();
        assert_eq!(UdpHeader::decode(&mut datagram).unwrap(), header);
        assert!(datagram.is_empty());
    }

    #[test]
    fn test_udp_header_truncated() {
        assert!(UdpHeader::decode(&mut Bytes::from_static(&[0, 0, 0])).is_err());
        assert!(UdpHeader::decode(&mut Bytes::from_static(&[0, 0, 0, 1, 10, 0])).is_err());
        assert!(UdpHeader::decode(&mut Bytes::from_static(&[0, 0, 0, 3, 5, b'a', 0, 1])).is_err());
        assert!(UdpHeader::decode(&mut Bytes::from_static(&[0, 0, 0, 9, 0, 0])).is_err());
    }

    #[test]
    fn test_udp_header_fragment() {
        let mut datagram = Bytes::from_static(&[0, 0, 1, 1, 127, 0, 0, 1, 0, 7]);
        let header = UdpHeader::decode(&mut datagram).unwrap();
        assert!(header.is_fragmented());
    }
}
