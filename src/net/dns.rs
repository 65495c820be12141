//! DNS collaborator
//!
//! Single-shot host name to address lookup.

use crate::error::NetError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::IpAddr;

/// Resolves a host name to one address
#[async_trait]
pub trait Resolver: Debug + Send + Sync {
    /// Look up `host` and return the first address
    async fn lookup(&self, host: &str) -> Result<IpAddr, NetError>;
}

/// Resolver backed by the operating system (`getaddrinfo`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<IpAddr, NetError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|source| NetError::Dns {
                host: host.to_string(),
                source,
            })?;

        let addr = addrs
            .next()
            .ok_or_else(|| NetError::NoAddress(host.to_string()))?;

        tracing::debug!("Resolved {} to {}", host, addr.ip());
        Ok(addr.ip())
    }
}
