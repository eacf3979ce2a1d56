// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/proxy.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file parses the --proxy setting and tunnels a TCP stream to the
// template server through a SOCKS4, SOCKS5 or HTTP CONNECT proxy.
//
// Tree Location:
// - src/source/proxy.rs (proxy configuration and handshakes)
// - Depends on: tokio, tokio-socks, hyper, base64

use crate::source::error::SourceError;
use crate::source::http::BoxedStream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{HOST, PROXY_AUTHORIZATION};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use log::debug;
use std::fmt;
use std::str::FromStr;
use tokio::net::TcpStream;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};

const LOG_TARGET: &str = "graxil::source::proxy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Socks4,
    Socks5,
    Http,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProxyKind::Socks4 => "socks4",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::Http => "http",
        };
        f.write_str(name)
    }
}

/// `[socks4|socks5|http://][user:pass@]host:port`, SOCKS5 when no scheme is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl FromStr for ProxyConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = match s.split_once("://") {
            Some((scheme, rest)) => {
                let kind = match scheme.to_ascii_lowercase().as_str() {
                    "socks4" => ProxyKind::Socks4,
                    "socks5" => ProxyKind::Socks5,
                    "http" => ProxyKind::Http,
                    other => return Err(format!("unsupported proxy type '{}'", other)),
                };
                (kind, rest)
            }
            None => (ProxyKind::Socks5, s),
        };

        let (credentials, address) = match rest.rsplit_once('@') {
            Some((credentials, address)) => (Some(credentials), address),
            None => (None, rest),
        };
        let (user, pass) = match credentials {
            Some(credentials) => match credentials.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(credentials.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| format!("proxy '{}' must include host:port", s))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("invalid proxy port '{}'", port))?;
        if host.is_empty() {
            return Err(format!("missing proxy host in '{}'", s));
        }

        Ok(ProxyConfig {
            kind,
            host: host.to_string(),
            port,
            user,
            pass,
        })
    }
}

impl ProxyConfig {
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Run the proxy handshake on `socket` (already connected to the proxy)
    /// so that the returned stream reaches `host:port`.
    pub async fn tunnel(&self, socket: TcpStream, host: &str, port: u16) -> Result<BoxedStream, SourceError> {
        debug!(target: LOG_TARGET, "Tunnelling to {}:{} through {} proxy {}", host, port, self.kind, self.authority());
        match self.kind {
            ProxyKind::Socks5 => {
                let stream = match (&self.user, &self.pass) {
                    (Some(user), pass) => {
                        Socks5Stream::connect_with_password_and_socket(
                            socket,
                            (host, port),
                            user,
                            pass.as_deref().unwrap_or(""),
                        )
                        .await
                    }
                    (None, _) => Socks5Stream::connect_with_socket(socket, (host, port)).await,
                }
                .map_err(|e| SourceError::Proxy(e.to_string()))?;
                Ok(Box::new(stream))
            }
            ProxyKind::Socks4 => {
                let stream = match &self.user {
                    Some(user) => Socks4Stream::connect_with_userid_and_socket(socket, (host, port), user).await,
                    None => Socks4Stream::connect_with_socket(socket, (host, port)).await,
                }
                .map_err(|e| SourceError::Proxy(e.to_string()))?;
                Ok(Box::new(stream))
            }
            ProxyKind::Http => self.http_connect(socket, host, port).await,
        }
    }

    /// HTTP CONNECT through hyper; the upgraded connection is the tunnel.
    async fn http_connect(&self, socket: TcpStream, host: &str, port: u16) -> Result<BoxedStream, SourceError> {
        let target = format!("{}:{}", host, port);
        let (mut sender, connection) = http1::Builder::new()
            .title_case_headers(true)
            .handshake::<_, Empty<Bytes>>(TokioIo::new(socket))
            .await
            .map_err(|e| SourceError::Proxy(format!("CONNECT failed: {}", e)))?;
        let driver = tokio::spawn(connection.with_upgrades());

        let mut request = Request::builder()
            .method(Method::CONNECT)
            .uri(target.as_str())
            .header(HOST, target.as_str());
        if let Some(user) = &self.user {
            let credentials = format!("{}:{}", user, self.pass.as_deref().unwrap_or(""));
            request = request.header(
                PROXY_AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(credentials.as_bytes())),
            );
        }
        let request = request
            .body(Empty::<Bytes>::new())
            .map_err(|e| SourceError::Proxy(format!("bad CONNECT target {}: {}", target, e)))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| SourceError::Proxy(format!("CONNECT failed: {}", e)))?;
        if !response.status().is_success() {
            driver.abort();
            return Err(SourceError::Proxy(format!("CONNECT rejected: {}", response.status())));
        }
        let tunnel = hyper::upgrade::on(response)
            .await
            .map_err(|e| SourceError::Proxy(format!("CONNECT tunnel failed: {}", e)))?;
        Ok(Box::new(TokioIo::new(tunnel)))
    }
}


// Changelog:
// - v1.1.0 (2025-07-09): HTTP CONNECT sent and upgraded through hyper.
// - v1.0.1 (2025-07-06): HTTP CONNECT reads the reply without over-reading.
// - v1.0.0 (2025-07-05): SOCKS4/SOCKS5/HTTP proxy support.
