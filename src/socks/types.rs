//! SOCKS5 type definitions
//!
//! Address variants carried by command messages and UDP headers, and the
//! per-connection session.

use super::consts::*;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Address field of a SOCKS5 message
///
/// The port travels next to it in every message, so it is kept separate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// IPv4 address (ATYP 0x01)
    Ipv4(Ipv4Addr),
    /// Domain name (ATYP 0x03), at most 255 bytes
    Domain(String),
    /// IPv6 address (ATYP 0x04)
    Ipv6(Ipv6Addr),
}

impl Address {
    /// The ATYP byte for this variant
    pub fn addr_type(&self) -> u8 {
        match self {
            Address::Ipv4(_) => SOCKS5_ADDR_TYPE_IPV4,
            Address::Domain(_) => SOCKS5_ADDR_TYPE_DOMAIN,
            Address::Ipv6(_) => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// The IP address, if this is not a domain name
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::Ipv4(ip) => Some(IpAddr::V4(*ip)),
            Address::Ipv6(ip) => Some(IpAddr::V6(*ip)),
            Address::Domain(_) => None,
        }
    }

    /// Whether this address matches any peer: an empty domain or `0.0.0.0`/`::`
    pub fn is_wildcard(&self) -> bool {
        match self {
            Address::Ipv4(ip) => ip.is_unspecified(),
            Address::Ipv6(ip) => ip.is_unspecified(),
            Address::Domain(domain) => domain.is_empty(),
        }
    }

    /// Number of bytes `encode` writes, ATYP included
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Address::Ipv4(_) => IPV4_ADDR_LEN,
            Address::Ipv6(_) => IPV6_ADDR_LEN,
            Address::Domain(domain) => 1 + domain.len(),
        }
    }

    /// Write `[ATYP][ADDR]`
    ///
    /// Domain names longer than 255 bytes are truncated; the decoder never
    /// produces one.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.addr_type());
        match self {
            Address::Ipv4(ip) => buf.put_slice(&ip.octets()),
            Address::Ipv6(ip) => buf.put_slice(&ip.octets()),
            Address::Domain(domain) => {
                let name = &domain.as_bytes()[..domain.len().min(MAX_DOMAIN_LEN)];
                buf.put_u8(name.len() as u8);
                buf.put_slice(name);
            }
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(ip) => Address::Ipv4(ip),
            IpAddr::V6(ip) => Address::Ipv6(ip),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::Ipv4(Ipv4Addr::UNSPECIFIED)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => write!(f, "{}", ip),
            Address::Ipv6(ip) => write!(f, "[{}]", ip),
            Address::Domain(domain) => write!(f, "{}", domain),
        }
    }
}

/// Per-connection state shared by the handshake stages
#[derive(Debug, Clone)]
pub struct Session {
    /// Local address of the accepted connection
    pub server_addr: SocketAddr,
    /// Address of the connected client
    pub peer_addr: SocketAddr,
    /// User name recorded by a successful username/password exchange
    pub user: Option<String>,
}

impl Session {
    /// Create a session for a freshly accepted connection
    pub fn new(server_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Session {
            server_addr,
            peer_addr,
            user: None,
        }
    }
}
