//! SOCKS5 command module
//!
//! Command descriptors, the registry of enabled commands, and the
//! [`Connection`] each command hands over to the relay layer.

mod bind;
mod connect;
mod matcher;
mod reply;
mod udp_associate;

pub use bind::handle_bind;
pub use connect::handle_connect;
pub use matcher::AddrMatcher;
pub use reply::send_success;
pub use udp_associate::{handle_udp_associate, UdpAssociation};

use super::codec::CommandMessage;
use super::consts::*;
use super::types::{Address, Session};
use crate::error::{NetError, SocksError, SocksErrorKind};
use crate::net::{BufferedSocket, Connector, Resolver};
use anyhow::Result;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Network collaborators the command handlers dial and resolve through
#[derive(Debug, Clone)]
pub struct NetContext {
    /// DNS collaborator
    pub resolver: Arc<dyn Resolver>,
    /// Dial/listen collaborator
    pub connector: Arc<dyn Connector>,
}

/// Target side of an established command
#[derive(Debug)]
pub enum Connection {
    /// Stream spliced with the client (CONNECT, BIND)
    Tcp(TcpStream),
    /// Datagram association controlled by the client stream (UDP ASSOCIATE)
    Udp(UdpAssociation),
}

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// TCP CONNECT
    Connect,
    /// TCP BIND
    Bind,
    /// UDP ASSOCIATE
    UdpAssociate,
}

impl Command {
    /// SOCKS5 command byte
    pub fn id(self) -> u8 {
        match self {
            Command::Connect => SOCKS5_CMD_TCP_CONNECT,
            Command::Bind => SOCKS5_CMD_TCP_BIND,
            Command::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }

    /// Name used in the configuration file
    pub fn name(self) -> &'static str {
        match self {
            Command::Connect => CMD_NAME_CONNECT,
            Command::Bind => CMD_NAME_BIND,
            Command::UdpAssociate => CMD_NAME_UDP_ASSOCIATE,
        }
    }

    /// Look a command up by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CMD_NAME_CONNECT => Some(Command::Connect),
            CMD_NAME_BIND => Some(Command::Bind),
            CMD_NAME_UDP_ASSOCIATE => Some(Command::UdpAssociate),
            _ => None,
        }
    }

    /// Run the command; on success the reply has been written
    pub async fn execute<S>(
        self,
        net: &NetContext,
        socket: &mut BufferedSocket<S>,
        session: &Session,
        request: &CommandMessage,
    ) -> Result<Connection>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            Command::Connect => handle_connect(net, socket, request).await,
            Command::Bind => handle_bind(net, socket, session, request).await,
            Command::UdpAssociate => handle_udp_associate(net, socket, session, request).await,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "CONNECT"),
            Command::Bind => write!(f, "BIND"),
            Command::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Enabled commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    /// Build the registry from configured names; unknown names are skipped
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut registry = CommandRegistry::default();
        for name in names {
            match Command::from_name(name.as_ref()) {
                Some(command) => registry.register(command),
                None => tracing::warn!("Unknown command '{}', skipped", name.as_ref()),
            }
        }
        registry
    }

    /// Enable `command`
    pub fn register(&mut self, command: Command) {
        if !self.commands.contains(&command) {
            self.commands.push(command);
        }
    }

    /// Enabled commands
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Find the enabled command with byte `id`
    pub fn get(&self, id: u8) -> Result<Command, SocksError> {
        self.commands
            .iter()
            .copied()
            .find(|c| c.id() == id)
            .ok_or_else(|| {
                SocksError::new(SocksErrorKind::CommandNotSupport)
                    .with_message(format!("Command not supported: {}", id))
            })
    }
}

/// Turn a wire address into an IP, asking the resolver for domain names
pub async fn resolve(resolver: &dyn Resolver, addr: &Address) -> Result<IpAddr, NetError> {
    match addr {
        Address::Domain(domain) => resolver.lookup(domain).await,
        _ => addr
            .ip()
            .ok_or_else(|| NetError::NoAddress(addr.to_string())),
    }
}
