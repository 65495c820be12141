//! Main SOCKS5 handler
//!
//! Drives one accepted connection through the handshake stages and into the
//! relay, and decides which error reply (if any) the client gets.
//!
//! # Protocol Flow
//!
//! 1. Method negotiation
//! 2. Authentication sub-negotiation of the selected method
//! 3. Command negotiation and execution (CONNECT, BIND or UDP ASSOCIATE)
//! 4. Relay until either side is done

use super::auth::AuthRegistry;
use super::codec::{CommandMessage, MethodReply, MethodRequest};
use super::command::{CommandRegistry, Connection, NetContext};
use super::relay::relay;
use super::types::Session;
use crate::auth_manager::{AllowAll, AuthManager, StaticAuthManager};
use crate::config::ServerConfig;
use crate::error::{SocksError, SocksErrorKind};
use crate::net::{BufferedSocket, Connector, DirectConnector, Resolver, SocketOpts, SystemResolver};
use anyhow::Result;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Shared, read-only protocol state: registries and collaborators
#[derive(Debug, Clone)]
pub struct Engine {
    auth_methods: AuthRegistry,
    commands: CommandRegistry,
    auth_manager: Arc<dyn AuthManager>,
    net: NetContext,
}

impl Engine {
    /// Create an engine from its parts
    pub fn new(
        auth_methods: AuthRegistry,
        commands: CommandRegistry,
        auth_manager: Arc<dyn AuthManager>,
        resolver: Arc<dyn Resolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Engine {
            auth_methods,
            commands,
            auth_manager,
            net: NetContext {
                resolver,
                connector,
            },
        }
    }

    /// Create an engine with the system resolver and direct sockets
    pub fn from_config(config: &ServerConfig) -> Self {
        let auth_manager: Arc<dyn AuthManager> = if config.allow_any_user {
            Arc::new(AllowAll)
        } else {
            Arc::new(StaticAuthManager::from_config(&config.users))
        };

        Engine::new(
            AuthRegistry::from_names(&config.auth_methods),
            CommandRegistry::from_names(&config.commands),
            auth_manager,
            Arc::new(SystemResolver),
            Arc::new(DirectConnector::new(SocketOpts::from_tcp_config(&config.tcp))),
        )
    }

    /// Enabled authentication methods
    pub fn auth_methods(&self) -> &AuthRegistry {
        &self.auth_methods
    }

    /// Enabled commands
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Handle one accepted connection until it is closed
    pub async fn handle<S>(&self, stream: S, session: Session)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        ConnectionHandler::new(self, stream, session).run().await
    }
}

/// Handshake stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Session created, nothing read yet
    Preparing,
    /// Reading the offered methods
    MethodNegotiation,
    /// Running the selected method's sub-negotiation
    Authentication,
    /// Reading and executing the command
    CommandNegotiation,
    /// Relaying traffic
    Piping,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preparing => "preparing",
            Stage::MethodNegotiation => "method negotiation",
            Stage::Authentication => "authentication",
            Stage::CommandNegotiation => "command negotiation",
            Stage::Piping => "piping",
        };
        f.write_str(name)
    }
}

struct ConnectionHandler<'a, S> {
    engine: &'a Engine,
    socket: BufferedSocket<S>,
    session: Session,
    stage: Stage,
}

impl<'a, S> ConnectionHandler<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(engine: &'a Engine, stream: S, session: Session) -> Self {
        ConnectionHandler {
            engine,
            socket: BufferedSocket::new(stream),
            session,
            stage: Stage::Preparing,
        }
    }

    async fn run(mut self) {
        let connection = match self.negotiate().await {
            Ok(connection) => connection,
            Err(e) => {
                self.fail(e).await;
                return;
            }
        };

        self.stage = Stage::Piping;
        let peer = self.session.peer_addr;
        let (stream, leftover) = self.socket.into_parts();
        match relay(stream, leftover, connection).await {
            Ok(()) => debug!("Connection from {} finished", peer),
            Err(e) => debug!("Relay for {} ended with error: {:#}", peer, e),
        }
    }

    async fn negotiate(&mut self) -> Result<Connection> {
        self.stage = Stage::MethodNegotiation;
        let request = MethodRequest::read_from(&mut self.socket).await?;
        let method = self.engine.auth_methods.select(&request.methods)?;
        self.socket
            .write(&MethodReply::new(method.id()).to_bytes())
            .await?;
        debug!("Selected authentication method {} for {}", method, self.session.peer_addr);

        self.stage = Stage::Authentication;
        method
            .authenticate(
                &mut self.socket,
                &mut self.session,
                self.engine.auth_manager.as_ref(),
            )
            .await?;

        self.stage = Stage::CommandNegotiation;
        let request = CommandMessage::read_from(&mut self.socket).await?;
        let command = self.engine.commands.get(request.code)?;
        info!(
            user = self.session.user.as_deref().unwrap_or("-"),
            "SOCKS5 {} request from {} to {}:{}",
            command,
            self.session.peer_addr,
            request.addr,
            request.port
        );

        command
            .execute(&self.engine.net, &mut self.socket, &self.session, &request)
            .await
    }

    /// Report `err` to the client where the protocol allows it, then close
    async fn fail(&mut self, err: anyhow::Error) {
        let reply = match err.downcast_ref::<SocksError>() {
            Some(socks) => {
                debug!(
                    "SOCKS5 error from {} during {}: {}",
                    self.session.peer_addr, self.stage, socks
                );
                socks.reply().clone()
            }
            None => {
                debug!(
                    "Connection from {} failed during {}: {:#}",
                    self.session.peer_addr, self.stage, err
                );
                if self.stage == Stage::CommandNegotiation {
                    SocksErrorKind::ServerInternalError.reply()
                } else {
                    Bytes::new()
                }
            }
        };

        if !reply.is_empty() && self.socket.is_writable() {
            if let Err(e) = self.socket.write(&reply).await {
                debug!("Failed to send error reply to {}: {}", self.session.peer_addr, e);
            }
        }
        self.socket.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::consts::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn engine(auth: &[&str], commands: &[&str]) -> Arc<Engine> {
        Arc::new(Engine::new(
            AuthRegistry::from_names(auth),
            CommandRegistry::from_names(commands),
            Arc::new(StaticAuthManager::new([("user", "pass")])),
            Arc::new(SystemResolver),
            Arc::new(DirectConnector::default()),
        ))
    }

    fn spawn_handler(engine: Arc<Engine>) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = duplex(1024);
        let session = Session::new(
            "127.0.0.1:1080".parse().unwrap(),
            "127.0.0.1:40000".parse().unwrap(),
        );
        let handle = tokio::spawn(async move { engine.handle(server, session).await });
        (client, handle)
    }

    async fn read_all(client: &mut DuplexStream) -> Vec<u8> {
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_bad_version_writes_nothing() {
        let (mut client, handle) = spawn_handler(engine(&["noAuth"], &["connect"]));

        client.write_all(&[0x04, 1, 0x00]).await.unwrap();
        assert!(read_all(&mut client).await.is_empty());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_acceptable_methods() {
        let (mut client, handle) = spawn_handler(engine(&["usrPasswd"], &["connect"]));

        client.write_all(&[5, 1, SOCKS5_AUTH_METHOD_NONE]).await.unwrap();
        assert_eq!(read_all(&mut client).await, vec![5, 0xFF]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_command() {
        let (mut client, handle) = spawn_handler(engine(&["noAuth"], &["connect"]));

        client
            .write_all(&[5, 1, 0, 5, SOCKS5_CMD_TCP_BIND, 0, 1, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();
        assert_eq!(
            read_all(&mut client).await,
            vec![5, 0, 5, 7, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_address_type() {
        let (mut client, handle) = spawn_handler(engine(&["noAuth"], &["connect"]));

        client
            .write_all(&[5, 1, 0, 5, SOCKS5_CMD_TCP_CONNECT, 0, 9])
            .await
            .unwrap();
        assert_eq!(
            read_all(&mut client).await,
            vec![5, 0, 5, 8, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_domain_is_internal_error() {
        let (mut client, handle) = spawn_handler(engine(&["noAuth"], &["connect"]));

        client
            .write_all(&[5, 1, 0, 5, SOCKS5_CMD_TCP_CONNECT, 0, 3, 2, 0xFF, 0xFE, 0, 80])
            .await
            .unwrap();
        assert_eq!(
            read_all(&mut client).await,
            vec![5, 0, 5, 1, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_failure_reply() {
        let (mut client, handle) = spawn_handler(engine(&["usrPasswd"], &["connect"]));

        client
            .write_all(&[5, 1, SOCKS5_AUTH_METHOD_PASSWORD])
            .await
            .unwrap();
        client
            .write_all(&[1, 4, b'u', b's', b'e', b'r', 3, b'b', b'a', b'd'])
            .await
            .unwrap();
        assert_eq!(read_all(&mut client).await, vec![5, 2, 5, 1]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_during_authentication_writes_nothing() {
        let (mut client, handle) = spawn_handler(engine(&["usrPasswd"], &["connect"]));

        client.write_all(&[5, 1, 2, 1, 4, b'u']).await.unwrap();
        client.shutdown().await.unwrap();
        // Only the method reply went out
        assert_eq!(read_all(&mut client).await, vec![5, 2]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_during_command_is_internal_error() {
        let (mut client, handle) = spawn_handler(engine(&["noAuth"], &["connect"]));

        client.write_all(&[5, 1, 0, 5, 1]).await.unwrap();
        client.shutdown().await.unwrap();
        assert_eq!(
            read_all(&mut client).await,
            vec![5, 0, 5, 1, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        handle.await.unwrap();
    }

    #[test]
    fn test_engine_from_config() {
        let config = ServerConfig {
            auth_methods: vec!["noAuth".to_string(), "gssapi".to_string()],
            commands: vec!["connect".to_string(), "udpAssociate".to_string()],
            ..Default::default()
        };
        let engine = Engine::from_config(&config);

        assert_eq!(engine.auth_methods().methods().len(), 1);
        assert_eq!(engine.commands().commands().len(), 2);
    }
}
