//! Networking primitives
//!
//! The buffered socket used by the handshake, plus the DNS and dial/listen
//! collaborators consumed by the command handlers.

mod connector;
mod dns;
mod socket;

pub use connector::{Connector, DirectConnector, SocketOpts};
pub use dns::{Resolver, SystemResolver};
pub use socket::BufferedSocket;
