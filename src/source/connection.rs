// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/connection.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the connection factory every work source opens its
// sockets through. It resolves the server (IP or domain), applies TCP
// no-delay and keep-alive, bounds the connect with a timeout, optionally
// tunnels through a proxy and wraps https servers in TLS.
//
// Tree Location:
// - src/source/connection.rs (socket creation policy)
// - Depends on: tokio, tokio-rustls, rustls, webpki-roots, crate::source::http

use crate::core::server::Scheme;
use crate::source::error::SourceError;
use crate::source::http::{BoxedStream, HttpConnection};
use crate::source::proxy::ProxyConfig;
use log::debug;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

const LOG_TARGET: &str = "graxil::source::connection";

/// Socket options applied to every connection a source opens.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub timeout: Duration,
    pub proxy: Option<ProxyConfig>,
    pub nodelay: bool,
    pub keepalive: bool,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

impl ConnectionFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            proxy: None,
            nodelay: true,
            keepalive: true,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Open an HTTP connection to `host:port`, within the connect timeout.
    pub async fn connect(&self, scheme: Scheme, host: &str, port: u16) -> Result<HttpConnection, SourceError> {
        let authority = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(self.timeout, self.open(scheme, host, port))
            .await
            .map_err(|_| SourceError::Timeout)??;
        debug!(target: LOG_TARGET, "Connected to {} ({})", authority, scheme.as_str());
        HttpConnection::handshake(stream, authority).await
    }

    async fn open(&self, scheme: Scheme, host: &str, port: u16) -> Result<BoxedStream, SourceError> {
        let stream: BoxedStream = match &self.proxy {
            Some(proxy) => {
                let socket = self.tcp_connect(&proxy.host, proxy.port).await.map_err(|e| match e {
                    SourceError::Io(io) => SourceError::Proxy(format!("cannot reach proxy {}: {}", proxy.authority(), io)),
                    other => other,
                })?;
                proxy.tunnel(socket, host, port).await?
            }
            None => Box::new(self.tcp_connect(host, port).await?),
        };

        match scheme {
            Scheme::Https => self.tls_wrap(stream, host).await,
            Scheme::Http => Ok(stream),
            Scheme::Stratum => Err(SourceError::Protocol(
                "stratum servers cannot be reached over HTTP".to_string(),
            )),
        }
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> Result<TcpStream, SourceError> {
        let addrs: Vec<SocketAddr> = match format!("{}:{}", host, port).parse::<SocketAddr>() {
            Ok(addr) => vec![addr],
            Err(_) => lookup_host((host, port)).await?.collect(),
        };

        let mut last_error = None;
        for addr in addrs {
            match self.connect_addr(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(target: LOG_TARGET, "Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(SourceError::Io(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no addresses found for {}", host))
        })))
    }

    async fn connect_addr(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(self.keepalive)?;
        let stream = socket.connect(addr).await?;
        stream.set_nodelay(self.nodelay)?; // Disable Nagle's algorithm for low latency
        Ok(stream)
    }

    async fn tls_wrap(&self, stream: BoxedStream, host: &str) -> Result<BoxedStream, SourceError> {
        let config = tls_config()?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| SourceError::Tls(format!("invalid server name {}: {}", host, e)))?;
        let stream = TlsConnector::from(config)
            .connect(server_name, stream)
            .await
            .map_err(|e| SourceError::Tls(e.to_string()))?;
        Ok(Box::new(stream))
    }
}

fn tls_config() -> Result<Arc<ClientConfig>, SourceError> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    if let Some(config) = CONFIG.get() {
        return Ok(config.clone());
    }
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SourceError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(CONFIG.get_or_init(|| Arc::new(config)).clone())
}


// Changelog:
// - v1.3.0 (2025-07-09): Connections complete the hyper handshake before use.
// - v1.2.0 (2025-07-06): TLS for https servers via rustls and webpki roots.
// - v1.1.0 (2025-07-05): Explicit factory replacing ad hoc socket setup.
//   - Keep-alive, no-delay and connect timeout applied to every socket.
//   - Optional SOCKS4/SOCKS5/HTTP proxy beneath the HTTP transport.
// - v1.0.0 (2025-06-23): DNS resolution for IP or domain addresses.
