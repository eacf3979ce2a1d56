// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/error.rs
// Version: 1.0.1
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the errors a work source reports while talking to a
// block-template provider.
//
// Tree Location:
// - src/source/error.rs (work source errors)
// - Depends on: thiserror, crate::core::error

use crate::core::error::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP 401. Terminal for the server that returned it.
    #[error("wrong username or password")]
    NotAuthorized,

    /// The provider answered with a JSON-RPC error object.
    #[error("server error: {0}")]
    Rpc(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("too many or bad redirects: {0}")]
    Redirect(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    /// Malformed HTTP or JSON-RPC framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("source stopped")]
    Cancelled,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SourceError {
    /// Errors recovered by closing the connection and trying again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Io(_) | SourceError::Timeout | SourceError::Proxy(_) | SourceError::Tls(_)
        )
    }

    /// A reset connection is routine when the peer dropped an idle socket.
    pub fn is_connection_reset(&self) -> bool {
        match self {
            SourceError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Protocol(format!("invalid JSON: {}", err))
    }
}


// Changelog:
// - v1.0.1 (2025-07-06): Connection resets classified separately.
// - v1.0.0 (2025-07-05): Initial work source error type.
