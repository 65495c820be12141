//! Test utilities for Socksgate
//!
//! Echo servers, a server start helper, and SOCKS5 handshake byte builders.

#![allow(dead_code)]

use socksgate::config::{ServerConfig, UserConfig};
use socksgate::Server;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a TCP server echoing every connection back to itself
pub async fn start_tcp_echo_server() -> SocketAddr {
    start_tcp_echo_server_on(Ipv4Addr::LOCALHOST.into()).await
}

/// Start a TCP echo server on `ip`
pub async fn start_tcp_echo_server_on(ip: IpAddr) -> SocketAddr {
    let listener = TcpListener::bind((ip, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a UDP server echoing every datagram to its sender
pub async fn start_udp_echo_server() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });
    addr
}

/// Test configuration builder
pub struct TestConfigBuilder {
    auth_methods: Vec<String>,
    commands: Vec<String>,
    users: Vec<UserConfig>,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            auth_methods: vec!["noAuth".to_string()],
            commands: vec![
                "connect".to_string(),
                "bind".to_string(),
                "udpAssociate".to_string(),
            ],
            users: Vec::new(),
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set enabled authentication methods
    pub fn auth_methods(mut self, methods: &[&str]) -> Self {
        self.auth_methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Set enabled commands
    pub fn commands(mut self, commands: &[&str]) -> Self {
        self.commands = commands.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add a user
    pub fn user(mut self, username: &str, password: &str) -> Self {
        self.users.push(UserConfig {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Build the configuration, listening on an ephemeral port
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            port: 0,
            auth_methods: self.auth_methods,
            commands: self.commands,
            users: self.users,
            ..Default::default()
        }
    }
}

/// A running server; dropping it stops the accept loop
pub struct TestServer {
    /// Address the server listens on
    pub addr: SocketAddr,
    _shutdown_tx: broadcast::Sender<bool>,
}

/// Start a server for `config` in the background
pub async fn start_server(config: ServerConfig) -> TestServer {
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(server.run(shutdown_rx));
    TestServer {
        addr,
        _shutdown_tx: shutdown_tx,
    }
}

/// Read a success reply carrying an IPv4 address and return that address
pub async fn read_ipv4_reply(stream: &mut TcpStream) -> SocketAddr {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[5, 0, 0, 1], "unexpected reply {:?}", reply);
    socks5_mock::parse_ipv4(&reply[4..])
}

/// Connect and complete the no-auth method negotiation
pub async fn connect_no_auth(server: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(server).await.unwrap();
    stream
        .write_all(&socks5_mock::create_method_request(&[0x00]))
        .await
        .unwrap();
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [5, 0]);
    stream
}

/// Read until the server closes the stream; a reset counts as closed
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use socksgate::socks::*;
    use std::net::{Ipv4Addr, SocketAddr};

    /// Create a method selection request
    pub fn create_method_request(methods: &[u8]) -> Vec<u8> {
        let mut request = vec![SOCKS5_VERSION, methods.len() as u8];
        request.extend_from_slice(methods);
        request
    }

    /// Create a username/password sub-negotiation request
    pub fn create_password_request(username: &str, password: &str) -> Vec<u8> {
        let mut request = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        request.extend_from_slice(username.as_bytes());
        request.push(password.len() as u8);
        request.extend_from_slice(password.as_bytes());
        request
    }

    /// Create a command request to an IPv4 address
    pub fn create_command_ipv4(cmd: u8, addr: SocketAddr) -> Vec<u8> {
        let ip = match addr.ip() {
            std::net::IpAddr::V4(ip) => ip,
            std::net::IpAddr::V6(_) => panic!("IPv4 address expected"),
        };
        let mut request = vec![SOCKS5_VERSION, cmd, SOCKS5_RESERVED, SOCKS5_ADDR_TYPE_IPV4];
        request.extend_from_slice(&ip.octets());
        request.extend_from_slice(&addr.port().to_be_bytes());
        request
    }

    /// Create a command request to a domain name
    pub fn create_command_domain(cmd: u8, domain: &str, port: u16) -> Vec<u8> {
        let mut request = vec![
            SOCKS5_VERSION,
            cmd,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        request.extend_from_slice(domain.as_bytes());
        request.extend_from_slice(&port.to_be_bytes());
        request
    }

    /// Wrap a payload in a UDP header addressed to `dest`
    pub fn create_udp_datagram(dest: SocketAddr, payload: &[u8]) -> Vec<u8> {
        let ip = match dest.ip() {
            std::net::IpAddr::V4(ip) => ip,
            std::net::IpAddr::V6(_) => panic!("IPv4 address expected"),
        };
        let mut datagram = vec![0, 0, 0, SOCKS5_ADDR_TYPE_IPV4];
        datagram.extend_from_slice(&ip.octets());
        datagram.extend_from_slice(&dest.port().to_be_bytes());
        datagram.extend_from_slice(payload);
        datagram
    }

    /// Parse `[IPv4][PORT]`
    pub fn parse_ipv4(bytes: &[u8]) -> SocketAddr {
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        SocketAddr::new(ip.into(), u16::from_be_bytes([bytes[4], bytes[5]]))
    }
}
