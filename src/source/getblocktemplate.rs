// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/getblocktemplate.rs
// Version: 1.4.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the getblocktemplate work source. It fetches templates
// over HTTP(S), builds jobs from them (generation transaction, merkle root and
// header), keeps a long poll open on its own connection, submits solved blocks
// and checks servers for a stratum diversion header.
//
// Tree Location:
// - src/source/getblocktemplate.rs (getblocktemplate client)
// - Depends on: tokio, tokio-util, async-trait, hyper (via source::http), crate::core, crate::miner::dispatcher

use crate::core::difficulty::{bits_to_target, parse_bits, target_from_hex};
use crate::core::error::CodecError;
use crate::core::server::{Scheme, Server};
use crate::core::sha256::sha256d;
use crate::core::transaction::{
    block_header, build_generation_transaction, hash_from_display_hex, merkle_root, swap_words, GenerationTx,
};
use crate::core::types::{BlockTemplate, Job, MinerOptions, WorkResult};
use crate::miner::dispatcher::Dispatcher;
use crate::source::connection::ConnectionFactory;
use crate::source::error::SourceError;
use crate::source::http::{split_uri, HttpConnection, HttpResponse};
use crate::source::protocol::{GbtProtocol, MINING_EXTENSIONS};
use crate::source::{SourceExit, WorkSource};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "graxil::source::gbt";

/// Redirect hops followed for a single request.
pub const MAX_REDIRECTS: usize = 3;
/// Pause between passes of the driving loop.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Back-off after a failed long poll.
const LONG_POLL_RETRY: Duration = Duration::from_millis(500);

/// Where and with which id to hold a long poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPollTarget {
    pub id: String,
    /// `longpolluri` from the template: a path on the same server or an
    /// absolute URI on another one.
    pub uri: Option<String>,
}

impl LongPollTarget {
    pub fn from_template(template: &BlockTemplate) -> Option<Self> {
        template.longpollid.as_ref().map(|id| LongPollTarget {
            id: id.clone(),
            uri: template.longpolluri.clone().filter(|uri| !uri.is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// getblocktemplate client for one server.
pub struct GbtSource {
    server: Arc<Server>,
    dispatcher: Arc<Dispatcher>,
    factory: ConnectionFactory,
    options: MinerOptions,
    headers: Vec<(&'static str, String)>,
    connection: AsyncMutex<Option<HttpConnection>>,
    lp_connection: AsyncMutex<Option<HttpConnection>>,
    long_poll: watch::Sender<Option<LongPollTarget>>,
    stratum_header: Mutex<Option<String>>,
    auth_failed: AtomicBool,
    fatal: Mutex<Option<SourceError>>,
    stop: CancellationToken,
}

impl GbtSource {
    pub fn new(server: Arc<Server>, dispatcher: Arc<Dispatcher>, factory: ConnectionFactory) -> Self {
        let options = dispatcher.options().clone();
        let headers = vec![
            ("User-Agent", options.user_agent.clone()),
            ("Authorization", server.basic_auth()),
            ("X-Mining-Extensions", MINING_EXTENSIONS.to_string()),
        ];
        let stop = dispatcher.shutdown_token().child_token();
        let (long_poll, _) = watch::channel(None);
        Self {
            server,
            dispatcher,
            factory,
            options,
            headers,
            connection: AsyncMutex::new(None),
            lp_connection: AsyncMutex::new(None),
            long_poll,
            stratum_header: Mutex::new(None),
            auth_failed: AtomicBool::new(false),
            fatal: Mutex::new(None),
            stop,
        }
    }

    pub fn authorization_failed(&self) -> bool {
        self.auth_failed.load(Ordering::Acquire)
    }

    /// Long-poll target learned from the most recent template.
    pub fn long_poll_target(&self) -> Option<LongPollTarget> {
        self.long_poll.borrow().clone()
    }

    /// Alternate-protocol header seen on the most recent response.
    pub fn stratum_header(&self) -> Option<String> {
        self.stratum_header.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            scheme: self.server.scheme,
            host: self.server.host.clone(),
            port: self.server.port,
            path: "/".to_string(),
        }
    }

    fn long_poll_endpoint(&self, target: &LongPollTarget) -> Endpoint {
        let Some(uri) = target.uri.as_deref() else {
            return self.endpoint();
        };
        let (scheme, authority, path) = split_uri(uri);
        let scheme = scheme
            .and_then(|s| s.parse::<Scheme>().ok())
            .unwrap_or(self.server.scheme);
        let (host, port) = match authority {
            Some(authority) => {
                let (host, port) = match authority.rsplit_once(':') {
                    Some((host, port)) => (host, port.parse::<u16>().ok()),
                    None => (authority.as_str(), None),
                };
                (host.to_string(), port.unwrap_or(scheme.default_port()))
            }
            None => (self.server.host.clone(), self.server.port),
        };
        Endpoint { scheme, host, port, path }
    }

    fn update_long_poll(&self, template: &BlockTemplate) {
        if let Some(target) = LongPollTarget::from_template(template) {
            self.long_poll.send_if_modified(|current| {
                if current.as_ref() == Some(&target) {
                    false
                } else {
                    *current = Some(target);
                    true
                }
            });
        }
    }

    /// One JSON-RPC exchange on the connection held in `slot`.
    ///
    /// The connection is put back only while hyper keeps it open; otherwise,
    /// and on any error, it is closed. `Ok(None)` reports a reset on a reused
    /// connection. A fresh connection that is reset counts as an I/O error.
    async fn request(
        &self,
        slot: &AsyncMutex<Option<HttpConnection>>,
        endpoint: &Endpoint,
        body: &[u8],
        timeout: Duration,
    ) -> Result<Option<Value>, SourceError> {
        if self.stop.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let long_poll = std::ptr::eq(slot, &self.lp_connection);
        let mut guard = slot.lock().await;
        let authority = endpoint.authority();

        let reused = match guard.take() {
            Some(mut connection) if connection.authority() == authority => {
                if connection.ready().await {
                    Some(connection)
                } else {
                    debug!(target: LOG_TARGET, "Connection to {} was closed, reconnecting", authority);
                    connection.shutdown();
                    None
                }
            }
            Some(stale) => {
                stale.shutdown();
                None
            }
            None => None,
        };
        let fresh = reused.is_none();
        let mut connection = match reused {
            Some(connection) => connection,
            None => {
                let connection = tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => return Err(SourceError::Cancelled),
                    connection = self.factory.connect(endpoint.scheme, &endpoint.host, endpoint.port) => connection?,
                };
                if long_poll {
                    info!(target: LOG_TARGET, "LP connected to {}", authority);
                } else {
                    info!(target: LOG_TARGET, "🔗 Connected to {}", authority);
                }
                connection
            }
        };

        let headers: Vec<(&str, &str)> = self.headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let outcome = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return Err(SourceError::Cancelled),
            outcome = tokio::time::timeout(timeout, exchange(&mut connection, &endpoint.path, &headers, body)) => outcome,
        };

        let response = match outcome {
            Err(_) => return Err(SourceError::Timeout),
            Ok(Err(SourceError::NotAuthorized)) => {
                error!(target: LOG_TARGET, "Wrong username or password for {}", self.server.name());
                self.auth_failed.store(true, Ordering::Release);
                return Err(SourceError::NotAuthorized);
            }
            Ok(Err(e)) if e.is_connection_reset() && !fresh => {
                debug!(target: LOG_TARGET, "Connection to {} reset: {}", authority, e);
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(response)) => response,
        };

        {
            let mut stratum = self.stratum_header.lock().unwrap_or_else(|e| e.into_inner());
            *stratum = response
                .header("x-stratum")
                .map(str::to_string)
                .filter(|header| !header.is_empty());
        }

        let result = decode(&response);
        if result.is_ok() && connection.is_open() {
            *guard = Some(connection);
        } else {
            connection.shutdown();
        }
        result.map(Some)
    }

    async fn close_connections(&self) {
        if let Some(connection) = self.connection.lock().await.take() {
            connection.shutdown();
        }
        if let Some(connection) = self.lp_connection.lock().await.take() {
            connection.shutdown();
        }
    }

    /// Record an error that ends this source and stop it.
    fn fail(&self, err: SourceError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(|e| e.into_inner());
        if fatal.is_none() {
            *fatal = Some(err);
        }
        drop(fatal);
        self.stop();
    }

    fn take_fatal(&self) -> Option<SourceError> {
        self.fatal.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn handle_result(&self, result: WorkResult) -> Option<SourceExit> {
        match self.dispatcher.accept_result(self, result).await {
            Ok(_) => None,
            Err(SourceError::NotAuthorized) => Some(SourceExit::AuthFailed),
            Err(SourceError::Cancelled) => Some(SourceExit::Shutdown),
            Err(e) => Some(SourceExit::Stopped(e)),
        }
    }

    async fn drive(&self, results: &mut UnboundedReceiver<WorkResult>) -> SourceExit {
        loop {
            if self.stop.is_cancelled() {
                return SourceExit::Shutdown;
            }
            if !self.dispatcher.is_current(&self.server) {
                info!(target: LOG_TARGET, "{} is no longer the current server", self.server.name());
                return SourceExit::FailedOver;
            }
            if self.dispatcher.failback_due() {
                info!(target: LOG_TARGET, "Attempting to fail back to the primary server");
                return SourceExit::Failback;
            }

            if self.dispatcher.has_updatable_workers() {
                match self.fetch_template(None, self.factory.timeout).await {
                    Ok(Some(template)) => {
                        self.dispatcher.record_connection_outcome(&self.server, true);
                        self.update_long_poll(&template);
                        match self.build_job(Some(&template)) {
                            Ok(Some(job)) => {
                                self.dispatcher.assign_work(Arc::new(job));
                            }
                            Ok(None) => {}
                            Err(e) => {
                                error!(target: LOG_TARGET, "Cannot build work from {}: {}", self.server.name(), e);
                                return SourceExit::Stopped(e);
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(SourceError::NotAuthorized) => return SourceExit::AuthFailed,
                    Err(SourceError::Cancelled) => return SourceExit::Shutdown,
                    Err(e) if e.is_transient() => {
                        warn!(target: LOG_TARGET, "Cannot reach {}: {}", self.server.name(), e);
                        if !self.dispatcher.record_connection_outcome(&self.server, false).is_unchanged() {
                            return SourceExit::FailedOver;
                        }
                    }
                    Err(e) => {
                        error!(target: LOG_TARGET, "Stopping source {}: {}", self.server.name(), e);
                        return SourceExit::Stopped(e);
                    }
                }
            }

            while let Ok(result) = results.try_recv() {
                if let Some(exit) = self.handle_result(result).await {
                    return exit;
                }
            }

            tokio::select! {
                _ = self.stop.cancelled() => {}
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                Some(result) = results.recv() => {
                    if let Some(exit) = self.handle_result(result).await {
                        return exit;
                    }
                }
            }
        }
    }

    async fn long_poll_loop(self: Arc<Self>) {
        let mut targets = self.long_poll.subscribe();
        loop {
            if targets.borrow_and_update().is_some() {
                break;
            }
            tokio::select! {
                _ = self.stop.cancelled() => return,
                changed = targets.changed() => if changed.is_err() { return },
            }
        }

        loop {
            if self.stop.is_cancelled() || self.authorization_failed() {
                return;
            }
            let Some(target) = targets.borrow_and_update().clone() else {
                return;
            };

            match self.fetch_template(Some(&target), self.options.long_poll_timeout).await {
                Ok(Some(template)) => {
                    self.dispatcher.record_connection_outcome(&self.server, true);
                    self.update_long_poll(&template);
                    match self.build_job(Some(&template)) {
                        Ok(Some(job)) => {
                            info!(target: LOG_TARGET,
                                "🆕 Long poll: new block {} at height {}",
                                job.prev_hash_hex(), job.height
                            );
                            self.dispatcher.supersede_work(Arc::new(job));
                        }
                        Ok(None) => {}
                        Err(e) => error!(target: LOG_TARGET, "Long poll template rejected: {}", e),
                    }
                }
                Ok(None) => {}
                Err(SourceError::Cancelled) => return,
                Err(SourceError::NotAuthorized) => {
                    self.stop();
                    return;
                }
                Err(e) if !e.is_transient() => {
                    error!(target: LOG_TARGET, "Long poll on {} failed, stopping source: {}", self.server.name(), e);
                    self.fail(e);
                    return;
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Long poll IO error: {}", e);
                    if let Some(connection) = self.lp_connection.lock().await.take() {
                        connection.shutdown();
                    }
                    tokio::select! {
                        _ = self.stop.cancelled() => return,
                        _ = tokio::time::sleep(LONG_POLL_RETRY) => {}
                    }
                }
            }
        }
    }
}

#[async_trait]
impl WorkSource for GbtSource {
    fn server(&self) -> Arc<Server> {
        self.server.clone()
    }

    async fn fetch_template(
        &self,
        long_poll: Option<&LongPollTarget>,
        timeout: Duration,
    ) -> Result<Option<BlockTemplate>, SourceError> {
        let request = GbtProtocol::create_template_request(long_poll.map(|target| target.id.as_str()));
        let body = GbtProtocol::to_body(&request);
        let response = match long_poll {
            Some(target) => {
                let endpoint = self.long_poll_endpoint(target);
                self.request(&self.lp_connection, &endpoint, &body, timeout).await?
            }
            None => self.request(&self.connection, &self.endpoint(), &body, timeout).await?,
        };
        match response {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn build_job(&self, template: Option<&BlockTemplate>) -> Result<Option<Job>, SourceError> {
        match template {
            Some(template) => Ok(Some(job_from_template(template, &self.options, self.server.clone())?)),
            None => Ok(None),
        }
    }

    async fn submit_block(&self, job: &Job, ntime: u32, nonce: u32) -> Result<Option<String>, SourceError> {
        let request = GbtProtocol::create_submit_request(&job.block_hex(ntime, nonce), job.job_id.as_deref());
        let body = GbtProtocol::to_body(&request);
        match self.request(&self.connection, &self.endpoint(), &body, self.factory.timeout).await? {
            Some(result) => {
                self.dispatcher.record_connection_outcome(&self.server, true);
                Ok(GbtProtocol::rejection_reason(&result))
            }
            None => Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset during submitblock",
            ))),
        }
    }

    async fn propose_block(&self, job: &Job, ntime: u32, nonce: u32) -> Result<Option<String>, SourceError> {
        let request = GbtProtocol::create_proposal_request(&job.block_hex(ntime, nonce), job.job_id.as_deref());
        let body = GbtProtocol::to_body(&request);
        match self.request(&self.connection, &self.endpoint(), &body, self.factory.timeout).await? {
            Some(result) => {
                let verdict = GbtProtocol::rejection_reason(&result);
                info!(target: LOG_TARGET, "Proposal response: {}", verdict.as_deref().unwrap_or("accepted"));
                Ok(verdict)
            }
            None => Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset during proposal",
            ))),
        }
    }

    async fn detect_alternate_protocol(&self) -> Result<Option<String>, SourceError> {
        let template = match self.fetch_template(None, self.factory.timeout).await {
            Ok(template) => template,
            Err(e) if e.is_transient() => {
                debug!(target: LOG_TARGET, "Stratum check of {} failed: {}", self.server.name(), e);
                None
            }
            Err(e) => return Err(e),
        };

        let Some(template) = template else {
            info!(target: LOG_TARGET, "No response to getblocktemplate from {}, using as stratum", self.server.name());
            return Ok(Some(self.server.host.clone()));
        };

        if let Some(header) = self.stratum_header() {
            let host = match header.find("://") {
                Some(index) => header[index + 3..].to_string(),
                None => header,
            };
            info!(target: LOG_TARGET, "Diverted to stratum on {}", host);
            return Ok(Some(host));
        }

        info!(target: LOG_TARGET, "Using getblocktemplate JSON-RPC on {} (no stratum header)", self.server.name());
        self.dispatcher.record_connection_outcome(&self.server, true);
        self.update_long_poll(&template);
        if let Some(job) = self.build_job(Some(&template))? {
            self.dispatcher.assign_work(Arc::new(job));
        }
        Ok(None)
    }

    async fn run(self: Arc<Self>, results: &mut UnboundedReceiver<WorkResult>) -> SourceExit {
        if self.authorization_failed() {
            return SourceExit::AuthFailed;
        }
        info!(target: LOG_TARGET, "⛏️  Mining on {}", self.server);

        let long_poll = tokio::spawn(self.clone().long_poll_loop());
        let exit = self.drive(results).await;

        self.stop();
        let _ = long_poll.await;
        self.close_connections().await;

        match exit {
            SourceExit::Shutdown if self.authorization_failed() => SourceExit::AuthFailed,
            SourceExit::Shutdown => match self.take_fatal() {
                Some(e) => SourceExit::Stopped(e),
                None => SourceExit::Shutdown,
            },
            exit => exit,
        }
    }

    fn stop(&self) {
        self.stop.cancel();
        // Idle sockets are closed here; in-flight requests see the cancellation.
        if let Ok(mut connection) = self.connection.try_lock() {
            connection.take();
        }
        if let Ok(mut connection) = self.lp_connection.try_lock() {
            connection.take();
        }
    }
}

/// POST and follow temporary redirects on the same connection.
async fn exchange(
    connection: &mut HttpConnection,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> Result<HttpResponse, SourceError> {
    let mut response = connection.post(path, headers, body).await?;
    let mut redirects = MAX_REDIRECTS;
    loop {
        match response.status {
            401 => return Err(SourceError::NotAuthorized),
            307 => {
                let location = response.header("location").unwrap_or("").trim().to_string();
                if redirects == 0 || location.is_empty() {
                    return Err(SourceError::Redirect(format!(
                        "gave up at '{}' after {} redirects",
                        location,
                        MAX_REDIRECTS - redirects
                    )));
                }
                redirects -= 1;
                debug!(target: LOG_TARGET, "Following redirect to {}", location);
                response = connection.post(&location, headers, body).await?;
            }
            _ => return Ok(response),
        }
    }
}

fn decode(response: &HttpResponse) -> Result<Value, SourceError> {
    match GbtProtocol::parse_response(&response.body) {
        Err(SourceError::Protocol(reason)) if response.status != 200 => Err(SourceError::Protocol(format!(
            "HTTP {} {} ({})",
            response.status, response.reason, reason
        ))),
        other => other,
    }
}

/// Build a job from a template: generation transaction, merkle root over it
/// and the template's transactions in order, then the pre-nonce header.
pub fn job_from_template(
    template: &BlockTemplate,
    options: &MinerOptions,
    server: Arc<Server>,
) -> Result<Job, CodecError> {
    let generation = generation_tx_for_template(template, options)?;

    let mut hashes = Vec::with_capacity(1 + template.transactions.len());
    let mut transactions = Vec::with_capacity(1 + template.transactions.len());
    hashes.push(generation.consensus_hash);
    transactions.push(generation.tx);
    for tx in &template.transactions {
        let data = hex::decode(&tx.data).map_err(|e| CodecError::hex("transactions.data", e))?;
        // Before segwit, `hash` carried the txid.
        let txid = match tx.txid.as_deref().or(tx.hash.as_deref()) {
            Some(txid) => hash_from_display_hex("transactions.txid", txid)?,
            None => sha256d(&data),
        };
        hashes.push(txid);
        transactions.push(data);
    }

    let merkle = merkle_root(&hashes);
    let prev_hash = hash_from_display_hex("previousblockhash", &template.previousblockhash)?;
    let bits = parse_bits(&template.bits)?;
    let header = block_header(template.version, &prev_hash, &merkle, template.curtime, bits, 0);
    let target = match template.target.as_deref() {
        Some(target) => target_from_hex(target)?,
        None => bits_to_target(bits),
    };

    Ok(Job::new(
        swap_words(&header),
        target,
        template.workid.clone(),
        transactions,
        server,
        template.height,
        template.allows_time(),
    ))
}

/// Our own generation transaction when an address is configured and the
/// provider allows it, otherwise the provider's.
pub fn generation_tx_for_template(template: &BlockTemplate, options: &MinerOptions) -> Result<GenerationTx, CodecError> {
    let witness_commitment = template
        .default_witness_commitment
        .as_deref()
        .map(|commitment| hex::decode(commitment).map_err(|e| CodecError::hex("default_witness_commitment", e)))
        .transpose()?;

    let build = |address: &str| {
        let value = template.coinbasevalue.ok_or(CodecError::MissingCoinbaseValue)?;
        build_generation_transaction(
            options.coinbase_message.as_bytes(),
            address,
            options.network,
            value,
            template.height,
            witness_commitment.as_deref(),
        )
    };

    match (&template.coinbasetxn, options.address.as_deref()) {
        (Some(_), Some(address)) if template.allows_coinbase() => build(address),
        (Some(provided), address) => {
            if let Some(address) = address {
                warn!(target: LOG_TARGET, "Address {} ignored, not allowed by work source", address);
            }
            let tx = hex::decode(&provided.data).map_err(|e| CodecError::hex("coinbasetxn.data", e))?;
            let consensus_hash = match provided.txid.as_deref() {
                Some(txid) => hash_from_display_hex("coinbasetxn.txid", txid)?,
                None => sha256d(&tx),
            };
            let full_hash = match provided.hash.as_deref() {
                Some(hash) => hash_from_display_hex("coinbasetxn.hash", hash)?,
                None => consensus_hash,
            };
            Ok(GenerationTx {
                tx,
                consensus_hash,
                full_hash,
            })
        }
        (None, Some(address)) => build(address),
        (None, None) => Err(CodecError::MissingAddress),
    }
}


// Changelog:
// - v1.4.0 (2025-07-09): hyper transport and failover fixes.
//   - Connection reuse follows hyper's connection state.
//   - A reset on a fresh connection counts toward the error tolerance.
//   - The driving loop exits once the dispatcher has moved to another server.
//   - A non-transient long-poll error stops the source.
// - v1.3.0 (2025-07-07): Proposals and at-most-once submission.
//   - propose_block for --propose; submit failures are not retried.
// - v1.2.0 (2025-07-06): Long poll on its own connection and host.
//   - longpolluri may name another host; the LP connection follows it.
//   - The stratum check queues its template as work.
// - v1.1.0 (2025-07-05): Keep-alive and redirect handling.
//   - Connections reused unless the response forbids it.
//   - 307 followed up to three times, 401 marks the source unusable.
// - v1.0.0 (2025-07-04): Initial getblocktemplate work source.
