//! Username/password authentication handler
//!
//! Implements the RFC 1929 sub-negotiation. The request version byte is read
//! and ignored; replies always carry version 5.

use crate::auth_manager::AuthManager;
use crate::error::{SocksError, SocksErrorKind};
use crate::net::BufferedSocket;
use crate::socks::consts::*;
use crate::socks::types::Session;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

/// Username/password authentication handler
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordAuth;

impl PasswordAuth {
    /// Perform username/password authentication
    ///
    /// # Protocol
    ///
    /// Client sends:
    /// ```text
    /// +----+------+----------+------+----------+
    /// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    /// +----+------+----------+------+----------+
    /// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    /// +----+------+----------+------+----------+
    /// ```
    ///
    /// Server responds `[0x05, STATUS]`. A rejected attempt is returned as an
    /// `AuthenticationFailure` error; its reply carries the failure status.
    pub async fn authenticate<S>(
        socket: &mut BufferedSocket<S>,
        session: &mut Session,
        auth_manager: &dyn AuthManager,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let _version = socket.read_u8().await?;

        let username_len = socket.read_u8().await? as usize;
        let username = socket.read(username_len).await?;

        let password_len = socket.read_u8().await? as usize;
        let password = socket.read(password_len).await?;

        let username = String::from_utf8_lossy(&username).into_owned();
        let verified = match std::str::from_utf8(&password) {
            Ok(password) => auth_manager.verify_credentials(&username, password).await,
            Err(_) => false,
        };

        if !verified {
            tracing::warn!(username = %username, "Password authentication failed");
            return Err(SocksError::new(SocksErrorKind::AuthenticationFailure)
                .with_message(format!("Authentication failure for user: {}", username))
                .into());
        }

        socket
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_SUCCESS])
            .await?;
        tracing::debug!(username = %username, "Password authentication successful");
        session.user = Some(username);

        Ok(())
    }
}
