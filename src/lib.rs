//! # Socksgate - SOCKS5 Proxy Server
//!
//! Socksgate is a SOCKS5 (RFC 1928) proxy server with optional
//! username/password authentication (RFC 1929). It supports the CONNECT,
//! BIND and UDP ASSOCIATE commands; which methods and commands are enabled
//! is decided by configuration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksgate::config::load_config;
//! use socksgate::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! Each accepted connection goes through method negotiation,
//! authentication and command negotiation, after which the client stream
//! is relayed to the target the command produced.
//!
//! ```text
//! SOCKS5 Client -> Socksgate -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod auth_manager;
pub mod config;
pub mod error;
pub mod net;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Error, SocksError, SocksErrorKind};
pub use server::{run_server, Server};

/// Version of the Socksgate library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
