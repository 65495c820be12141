//! Server configuration types
//!
//! Defines the `[server]` table and its nested sections.

use crate::socks::consts::{AUTH_NAME_NONE, AUTH_NAME_PASSWORD, CMD_NAME_CONNECT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1080
}

fn default_auth_methods() -> Vec<String> {
    vec![AUTH_NAME_NONE.to_string()]
}

fn default_commands() -> Vec<String> {
    vec![CMD_NAME_CONNECT.to_string()]
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enabled authentication methods (`noAuth`, `usrPasswd`)
    #[serde(default = "default_auth_methods")]
    pub auth_methods: Vec<String>,

    /// Enabled commands (`connect`, `bind`, `udpAssociate`)
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Accept any username/password pair instead of checking `users`
    #[serde(default)]
    pub allow_any_user: bool,

    /// Options for outbound TCP connections
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Credentials for `usrPasswd`
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            port: default_port(),
            auth_methods: default_auth_methods(),
            commands: default_commands(),
            allow_any_user: false,
            tcp: TcpConfig::default(),
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// The socket address to bind
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .map_err(|_| format!("Invalid listen address: {}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Whether username/password authentication is enabled
    pub fn has_password_auth(&self) -> bool {
        self.auth_methods.iter().any(|m| m == AUTH_NAME_PASSWORD)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen_socket_addr()?;

        if self.has_password_auth() && !self.allow_any_user && self.users.is_empty() {
            return Err("usrPasswd enabled but no users configured".to_string());
        }
        Ok(())
    }
}

fn default_nodelay() -> bool {
    true
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// TCP socket configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// One `[[server.users]]` entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserConfig {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}
