// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/http.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file wraps a hyper HTTP/1.1 client connection over a plain, TLS or
// proxied stream. Each connection owns one SendRequest handle; hyper drives
// the framing and decides whether the connection survives a response.
//
// Tree Location:
// - src/source/http.rs (HTTP/1.1 connection handle)
// - Depends on: hyper, hyper-util, http-body-util, tokio

use crate::source::error::SourceError;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "graxil::source::http";

/// Largest response body accepted. Templates with a full mempool run to a
/// few megabytes.
pub const MAX_BODY: usize = 64 * 1024 * 1024;

/// Any byte stream an HTTP connection can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header named `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One HTTP/1.1 connection to one authority.
pub struct HttpConnection {
    sender: SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
    authority: String,
}

impl HttpConnection {
    /// Run the client handshake on `stream` and spawn the connection task.
    pub async fn handshake(stream: BoxedStream, authority: impl Into<String>) -> Result<Self, SourceError> {
        let authority = authority.into();
        let (sender, connection) = http1::Builder::new()
            .title_case_headers(true)
            .handshake(TokioIo::new(stream))
            .await
            .map_err(transport_error)?;

        let peer = authority.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(target: LOG_TARGET, "Connection to {} ended: {}", peer, e);
            }
        });
        Ok(Self {
            sender,
            driver,
            authority,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// False once hyper has closed the connection.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Wait until the connection can carry another request. False when the
    /// peer or the last response closed it.
    pub async fn ready(&mut self) -> bool {
        self.sender.ready().await.is_ok()
    }

    /// Send a POST and read the complete response.
    pub async fn post(
        &mut self,
        path: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, SourceError> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, self.authority.as_str());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .body(Full::new(Bytes::copy_from_slice(body)))
            .map_err(|e| SourceError::Protocol(format!("cannot build request for {}: {}", path, e)))?;

        debug!(target: LOG_TARGET, "POST {} to {} ({} bytes)", path, self.authority, body.len());
        self.sender.ready().await.map_err(transport_error)?;
        let response = self.sender.send_request(request).await.map_err(transport_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = Limited::new(response.into_body(), MAX_BODY)
            .collect()
            .await
            .map_err(body_error)?
            .to_bytes()
            .to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }

    /// Drop the request handle and the socket beneath it.
    pub fn shutdown(self) {
        self.driver.abort();
    }
}

/// Map a hyper failure onto the source error kinds. A connection that went
/// away before or during the response reads as a reset.
pub(crate) fn transport_error(err: hyper::Error) -> SourceError {
    let io_kind = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .map(|io| io.kind());
    if let Some(kind) = io_kind {
        return SourceError::Io(std::io::Error::new(kind, err.to_string()));
    }
    if err.is_closed() || err.is_canceled() || err.is_incomplete_message() {
        return SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            err.to_string(),
        ));
    }
    if err.is_timeout() {
        return SourceError::Timeout;
    }
    SourceError::Protocol(err.to_string())
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>) -> SourceError {
    match err.downcast::<hyper::Error>() {
        Ok(err) => transport_error(*err),
        Err(err) => SourceError::Protocol(format!("response body rejected: {}", err)),
    }
}

/// Split a long-poll URI into an optional `host[:port]` and a path.
///
/// A bare path keeps the current server; an absolute URI may name another
/// host (and scheme) to hold the long poll on.
pub fn split_uri(uri: &str) -> (Option<String>, Option<String>, String) {
    let (scheme, rest) = match uri.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, uri),
    };
    if scheme.is_none() && uri.starts_with('/') {
        return (None, None, uri.to_string());
    }
    if scheme.is_none() && uri.is_empty() {
        return (None, None, "/".to_string());
    }
    match rest.find('/') {
        Some(slash) => {
            let host = &rest[..slash];
            let host = (!host.is_empty()).then(|| host.to_string());
            (scheme, host, rest[slash..].to_string())
        }
        None => (scheme, (!rest.is_empty()).then(|| rest.to_string()), "/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Read one request whose body is `{}`.
    async fn read_request(server: &mut DuplexStream) -> String {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.ends_with(b"{}") {
            let n = server.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(request).unwrap()
    }

    async fn roundtrip(raw: &'static [u8]) -> (HttpConnection, Result<HttpResponse, SourceError>) {
        let (client, mut server) = duplex(64 * 1024);
        let mut connection = HttpConnection::handshake(Box::new(client), "node:8332").await.unwrap();
        let server_task = tokio::spawn(async move {
            read_request(&mut server).await;
            server.write_all(raw).await.unwrap();
            server.shutdown().await.unwrap();
        });
        let response = connection.post("/", &[("X-Test", "1")], b"{}").await;
        server_task.await.unwrap();
        (connection, response)
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let (_, response) =
            roundtrip(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nX-Stratum: stratum+tcp://pool:3333\r\n\r\nbody").await;
        let response = response.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.body, b"body");
        assert_eq!(response.header("x-stratum"), Some("stratum+tcp://pool:3333"));
    }

    #[tokio::test]
    async fn reads_chunked_body() {
        let (_, response) =
            roundtrip(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2;ext=1\r\nde\r\n0\r\n\r\n").await;
        assert_eq!(response.unwrap().body, b"abcde");
    }

    #[tokio::test]
    async fn connection_close_ends_reuse() {
        let (mut connection, response) =
            roundtrip(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n").await;
        assert_eq!(response.unwrap().status, 200);
        assert!(!connection.ready().await);
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn body_until_close_is_read() {
        let (mut connection, response) = roundtrip(b"HTTP/1.1 200 OK\r\n\r\n{\"result\":1}").await;
        assert_eq!(response.unwrap().body, b"{\"result\":1}");
        assert!(!connection.ready().await);
    }

    #[tokio::test]
    async fn keep_alive_carries_second_request() {
        let (client, mut server) = duplex(64 * 1024);
        let mut connection = HttpConnection::handshake(Box::new(client), "node:8332").await.unwrap();
        let server_task = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in [&b"one"[..], &b"two"[..]] {
                requests.push(read_request(&mut server).await);
                let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", reply.len());
                server.write_all(head.as_bytes()).await.unwrap();
                server.write_all(reply).await.unwrap();
            }
            requests
        });

        let first = connection.post("/", &[("Authorization", "Basic eA==")], b"{}").await.unwrap();
        assert!(connection.ready().await);
        let second = connection.post("/lp", &[], b"{}").await.unwrap();
        assert_eq!(first.body, b"one");
        assert_eq!(second.body, b"two");

        let requests = server_task.await.unwrap();
        assert!(requests[0].starts_with("POST / HTTP/1.1\r\n"));
        assert!(requests[0].contains("Host: node:8332\r\n"));
        assert!(requests[0].contains("Authorization: Basic eA==\r\n"));
        assert!(requests[0].contains("Content-Length: 2\r\n"));
        assert!(requests[1].starts_with("POST /lp HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn rejects_garbage_status_line() {
        let (_, response) = roundtrip(b"SSH-2.0-OpenSSH\r\n\r\n").await;
        assert!(matches!(response, Err(SourceError::Protocol(_))));
    }

    #[tokio::test]
    async fn peer_closing_early_reads_as_reset() {
        let (_, response) = roundtrip(b"").await;
        let err = response.unwrap_err();
        assert!(err.is_connection_reset(), "unexpected error {:?}", err);
    }

    #[test]
    fn splits_long_poll_uris() {
        assert_eq!(split_uri("/LP"), (None, None, "/LP".to_string()));
        assert_eq!(split_uri(""), (None, None, "/".to_string()));
        assert_eq!(
            split_uri("http://lp.example.com:8339/poll?x=1"),
            (Some("http".to_string()), Some("lp.example.com:8339".to_string()), "/poll?x=1".to_string())
        );
        assert_eq!(
            split_uri("https://lp.example.com"),
            (Some("https".to_string()), Some("lp.example.com".to_string()), "/".to_string())
        );
    }
}

// Changelog:
// - v2.0.0 (2025-07-09): Connections run on hyper's HTTP/1.1 client.
//   - One SendRequest per connection; reuse follows hyper's connection state.
//   - Hand-written status, header and chunked framing removed.
// - v1.1.0 (2025-07-06): Chunked bodies and long-poll URI splitting.
// - v1.0.0 (2025-07-05): Initial HTTP/1.1 framing over boxed async streams.
