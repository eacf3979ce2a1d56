// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for work sources: the clients that
// fetch block templates from a server, turn them into jobs and submit solved
// blocks. It defines the WorkSource capability the dispatcher drives.
//
// Tree Location:
// - src/source/mod.rs (work source entry point)
// - Submodules: connection, error, getblocktemplate, http, protocol, proxy

pub mod connection;
pub mod error;
pub mod getblocktemplate;
pub mod http;
pub mod protocol;
pub mod proxy;

use crate::core::server::Server;
use crate::core::types::{BlockTemplate, Job, WorkResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// Re-export key types for convenience
pub use connection::ConnectionFactory;
pub use error::SourceError;
pub use getblocktemplate::{GbtSource, LongPollTarget};
pub use proxy::{ProxyConfig, ProxyKind};

/// Why a source's driving loop returned control to the dispatcher.
#[derive(Debug)]
pub enum SourceExit {
    /// Failback interval elapsed while on a non-primary server.
    Failback,
    /// The dispatcher switched servers after repeated connection errors.
    FailedOver,
    /// Credentials were rejected; the server must not be used again.
    AuthFailed,
    /// The source stopped on an error it cannot recover from itself.
    Stopped(SourceError),
    /// Shutdown was requested.
    Shutdown,
}

/// A client for one block-template server.
///
/// Implementations own their connections exclusively. The dispatcher picks
/// the implementation per server at startup and only talks to it through
/// this trait.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// The server this source talks to.
    fn server(&self) -> Arc<Server>;

    /// Fetch a template, optionally blocking on a long poll.
    ///
    /// `Ok(None)` means the connection was reset and has been closed; the
    /// next call reconnects.
    async fn fetch_template(
        &self,
        long_poll: Option<&LongPollTarget>,
        timeout: Duration,
    ) -> Result<Option<BlockTemplate>, SourceError>;

    /// Build a job from a template. `None` in, `None` out.
    fn build_job(&self, template: Option<&BlockTemplate>) -> Result<Option<Job>, SourceError>;

    /// Submit a solved block. `Ok(None)` is acceptance, `Ok(Some(reason))` a
    /// rejection.
    async fn submit_block(&self, job: &Job, ntime: u32, nonce: u32) -> Result<Option<String>, SourceError>;

    /// Ask the provider to validate a block without committing it.
    async fn propose_block(&self, job: &Job, ntime: u32, nonce: u32) -> Result<Option<String>, SourceError>;

    /// Check for a diversion to another mining protocol. Returns the host to
    /// divert to, or `None` to keep using this source.
    async fn detect_alternate_protocol(&self) -> Result<Option<String>, SourceError>;

    /// Drive the source until it has to hand control back, submitting the
    /// results received on `results` along the way.
    async fn run(self: Arc<Self>, results: &mut UnboundedReceiver<WorkResult>) -> SourceExit;

    /// Request the source to stop and close its sockets.
    fn stop(&self);
}

// Changelog:
// - v2.0.0 (2025-07-05): Replaced the pool module with work sources.
//   - WorkSource trait with template fetch, job build, submit and stratum detection.
//   - getblocktemplate implementation over HTTP(S) with proxy support.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
