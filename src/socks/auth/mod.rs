//! SOCKS5 authentication module
//!
//! Method descriptors and the registry of enabled methods.

mod none;
mod password;

pub use none::NoAuth;
pub use password::PasswordAuth;

use super::consts::*;
use super::types::Session;
use crate::auth_manager::AuthManager;
use crate::error::{SocksError, SocksErrorKind};
use crate::net::BufferedSocket;
use anyhow::Result;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    NoAuth,
    /// Username/password authentication
    UsrPasswd,
}

impl AuthMethod {
    /// SOCKS5 method byte
    pub fn id(self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::UsrPasswd => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }

    /// Name used in the configuration file
    pub fn name(self) -> &'static str {
        match self {
            AuthMethod::NoAuth => AUTH_NAME_NONE,
            AuthMethod::UsrPasswd => AUTH_NAME_PASSWORD,
        }
    }

    /// Look a method up by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            AUTH_NAME_NONE => Some(AuthMethod::NoAuth),
            AUTH_NAME_PASSWORD => Some(AuthMethod::UsrPasswd),
            _ => None,
        }
    }

    /// Run the method's sub-negotiation
    pub async fn authenticate<S>(
        self,
        socket: &mut BufferedSocket<S>,
        session: &mut Session,
        auth_manager: &dyn AuthManager,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            AuthMethod::NoAuth => NoAuth::authenticate().await,
            AuthMethod::UsrPasswd => {
                PasswordAuth::authenticate(socket, session, auth_manager).await
            }
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Enabled authentication methods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRegistry {
    methods: Vec<AuthMethod>,
}

impl AuthRegistry {
    /// Build the registry from configured names; unknown names are skipped
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut registry = AuthRegistry::default();
        for name in names {
            match AuthMethod::from_name(name.as_ref()) {
                Some(method) => registry.register(method),
                None => tracing::warn!("Unknown authentication method '{}', skipped", name.as_ref()),
            }
        }
        registry
    }

    /// Enable `method`
    pub fn register(&mut self, method: AuthMethod) {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
    }

    /// Whether `method` is enabled
    pub fn contains(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Enabled methods
    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    /// Pick the first method, in client order, that is enabled here
    pub fn select(&self, offered: &[u8]) -> Result<AuthMethod, SocksError> {
        offered
            .iter()
            .find_map(|id| self.methods.iter().copied().find(|m| m.id() == *id))
            .ok_or_else(|| {
                SocksError::new(SocksErrorKind::NoAcceptableMethods)
                    .with_message(format!("No acceptable methods in {:?}", offered))
            })
    }
}
