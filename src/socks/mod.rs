//! SOCKS5 protocol engine
//!
//! Wire codec, authentication and command registries, relays, and the
//! per-connection handler that ties them together.

pub mod auth;
pub mod codec;
pub mod command;
pub mod consts;
mod handler;
pub mod relay;
pub mod types;

pub use auth::{AuthMethod, AuthRegistry};
pub use codec::{CommandMessage, MethodReply, MethodRequest, UdpHeader};
pub use command::{AddrMatcher, Command, CommandRegistry, Connection, NetContext, UdpAssociation};
pub use consts::*;
pub use handler::{Engine, Stage};
pub use types::{Address, Session};
