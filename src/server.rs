//! SOCKS5 server
//!
//! Binds the listening socket and spawns one handler task per accepted
//! connection.

use crate::config::{Config, ServerConfig};
use crate::socks::{Engine, Session};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Run a server for `config` until shutdown
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = Server::bind(&config.server).await?;
    server.run(shutdown_rx).await
}

/// A bound SOCKS5 server
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    engine: Arc<Engine>,
}

impl Server {
    /// Bind the configured listen address and build the engine
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = config
            .listen_socket_addr()
            .map_err(crate::error::Error::Config)?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Server::with_engine(listener, Engine::from_config(config)))
    }

    /// Serve `engine` on an already bound listener
    pub fn with_engine(listener: TcpListener, engine: Engine) -> Self {
        Server {
            listener,
            engine: Arc::new(engine),
        }
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to get listener address")
    }

    /// Accept connections until a shutdown signal is received
    ///
    /// Connections already accepted keep running after this returns.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        let local_addr = self.local_addr()?;
        info!("SOCKS5 server listening on {}", local_addr);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_handler(stream, peer),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr) {
        let server_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for {}: {}", peer, e);
                return;
            }
        };
        debug!("Accepted connection from {}", peer);

        let engine = self.engine.clone();
        tokio::spawn(async move {
            engine.handle(stream, Session::new(server_addr, peer)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let config = ServerConfig {
            listen_addr: "not-an-ip".to_string(),
            ..Default::default()
        };
        assert!(Server::bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(server.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
