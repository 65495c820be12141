//! Peer address filter
//!
//! BIND accepts only the inbound connection the client announced, and UDP
//! ASSOCIATE tells client datagrams apart from remote ones. Both use the
//! same rule: port 0 matches any port, an unspecified IP (or empty domain)
//! matches any address.

use super::resolve;
use crate::error::NetError;
use crate::net::Resolver;
use crate::socks::types::Address;
use std::net::{IpAddr, SocketAddr};

/// Predicate over peer socket addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrMatcher {
    /// `None` matches any address
    ip: Option<IpAddr>,
    /// 0 matches any port
    port: u16,
}

impl AddrMatcher {
    /// Build a matcher from an address and port taken off the wire,
    /// resolving domain names first
    pub async fn resolve(
        resolver: &dyn Resolver,
        addr: &Address,
        port: u16,
    ) -> Result<Self, NetError> {
        let ip = if addr.is_wildcard() {
            None
        } else {
            Some(resolve(resolver, addr).await?)
        };
        Ok(AddrMatcher { ip, port })
    }

    /// Build a matcher from already resolved parts
    pub fn new(ip: Option<IpAddr>, port: u16) -> Self {
        AddrMatcher {
            ip: ip.filter(|ip| !ip.is_unspecified()),
            port,
        }
    }

    /// A matcher accepting every peer
    pub fn any() -> Self {
        AddrMatcher { ip: None, port: 0 }
    }

    /// The concrete endpoint, if both address and port are specified
    pub fn endpoint(&self) -> Option<SocketAddr> {
        match (self.ip, self.port) {
            (Some(ip), port) if port != 0 => Some(SocketAddr::new(ip, port)),
            _ => None,
        }
    }

    /// Whether `peer` passes the filter
    pub fn matches(&self, peer: SocketAddr) -> bool {
        if self.port != 0 && self.port != peer.port() {
            return false;
        }
        match self.ip {
            Some(ip) => canonical(ip) == canonical(peer.ip()),
            None => true,
        }
    }
}

/// Fold IPv4-mapped IPv6 addresses onto IPv4
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}
