//! Error types for Socksgate
//!
//! This module defines the application error type and the SOCKS5 error
//! taxonomy. Every [`SocksError`] carries the exact bytes that must be written
//! back to the client when it aborts a handshake.

use bytes::Bytes;
use std::io;
use thiserror::Error;

use crate::socks::consts::*;

/// Main error type for Socksgate operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks(#[from] SocksError),
}

/// Kinds of SOCKS5 failures that have a defined wire reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksErrorKind {
    /// Wrong protocol version byte; nothing is sent back
    IncorrectVersion,
    /// None of the offered authentication methods is enabled
    NoAcceptableMethods,
    /// Username/password sub-negotiation rejected the credentials
    AuthenticationFailure,
    /// Command code not enabled on this server
    CommandNotSupport,
    /// Target host could not be resolved
    HostUnreachable,
    /// Target could not be dialed, or a local socket could not be bound
    NetworkUnreachable,
    /// Unknown ATYP byte
    AddressTypeNotAllowed,
    /// Any other failure during command negotiation
    ServerInternalError,
}

impl SocksErrorKind {
    /// The reply payload written to the client for this kind
    pub fn reply(self) -> Bytes {
        match self {
            SocksErrorKind::IncorrectVersion => Bytes::new(),
            SocksErrorKind::NoAcceptableMethods => {
                Bytes::from_static(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
            }
            SocksErrorKind::AuthenticationFailure => {
                Bytes::from_static(&[SOCKS5_VERSION, SOCKS5_AUTH_FAILURE])
            }
            SocksErrorKind::CommandNotSupport => {
                command_error_reply(SOCKS5_REPLY_COMMAND_NOT_SUPPORTED)
            }
            SocksErrorKind::HostUnreachable => command_error_reply(SOCKS5_REPLY_HOST_UNREACHABLE),
            SocksErrorKind::NetworkUnreachable => {
                command_error_reply(SOCKS5_REPLY_NETWORK_UNREACHABLE)
            }
            SocksErrorKind::AddressTypeNotAllowed => {
                command_error_reply(SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED)
            }
            SocksErrorKind::ServerInternalError => {
                command_error_reply(SOCKS5_REPLY_GENERAL_FAILURE)
            }
        }
    }
}

/// `[VER, REP, 0, 0, 0, 0, 0, 0, 0, 0]`
fn command_error_reply(code: u8) -> Bytes {
    let mut reply = vec![0u8; 10];
    reply[0] = SOCKS5_VERSION;
    reply[1] = code;
    Bytes::from(reply)
}

/// A SOCKS5 failure with the reply that reports it to the client
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct SocksError {
    kind: SocksErrorKind,
    message: String,
    reply: Bytes,
}

impl SocksError {
    /// Create an error with the canonical message and reply for `kind`
    pub fn new(kind: SocksErrorKind) -> Self {
        let message = match kind {
            SocksErrorKind::IncorrectVersion => "unknown protocol",
            SocksErrorKind::NoAcceptableMethods => "no acceptable methods",
            SocksErrorKind::AuthenticationFailure => "authentication failure",
            SocksErrorKind::CommandNotSupport => "command not supported",
            SocksErrorKind::HostUnreachable => "host unreachable",
            SocksErrorKind::NetworkUnreachable => "network unreachable",
            SocksErrorKind::AddressTypeNotAllowed => "address type not supported",
            SocksErrorKind::ServerInternalError => "general SOCKS server failure",
        };
        SocksError {
            kind,
            message: message.to_string(),
            reply: kind.reply(),
        }
    }

    /// Replace the human readable message, keeping the reply payload
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Error kind
    pub fn kind(&self) -> SocksErrorKind {
        self.kind
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bytes to send to the client; empty means send nothing
    pub fn reply(&self) -> &Bytes {
        &self.reply
    }
}

impl From<SocksErrorKind> for SocksError {
    fn from(kind: SocksErrorKind) -> Self {
        SocksError::new(kind)
    }
}

impl From<NetError> for SocksError {
    fn from(err: NetError) -> Self {
        let kind = if err.is_dns() {
            SocksErrorKind::HostUnreachable
        } else {
            SocksErrorKind::NetworkUnreachable
        };
        SocksError::new(kind).with_message(err.to_string())
    }
}

/// Errors raised by the buffered socket
#[derive(Error, Debug)]
pub enum SocketError {
    /// Read requested after the peer ended the stream or an error occurred
    #[error("read on closed socket")]
    ReadOnClosed,

    /// Write requested after close or an error occurred
    #[error("write on closed socket")]
    WriteOnClosed,

    /// Underlying transport failure
    #[error("socket IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by the DNS and dial/listen collaborators
#[derive(Error, Debug)]
pub enum NetError {
    /// Name lookup failed
    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        /// Host name that was looked up
        host: String,
        /// Resolver error
        #[source]
        source: io::Error,
    },

    /// Name lookup returned no address
    #[error("DNS lookup for {0} returned no address")]
    NoAddress(String),

    /// Outbound TCP connection failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Dialed address
        addr: String,
        /// Connect error
        #[source]
        source: io::Error,
    },

    /// Binding a listener or datagram socket failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested local address
        addr: String,
        /// Bind error
        #[source]
        source: io::Error,
    },
}

impl NetError {
    /// Whether this error came from name resolution
    pub fn is_dns(&self) -> bool {
        matches!(self, NetError::Dns { .. } | NetError::NoAddress(_))
    }
}
