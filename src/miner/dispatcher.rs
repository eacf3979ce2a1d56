// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/dispatcher.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the dispatcher: the single owner of the server list,
// per-server health, the worker pool and job assignment. Sources call into it
// to hand over jobs, check and submit worker results, and report connection
// outcomes that drive failover and failback.
//
// Tree Location:
// - src/miner/dispatcher.rs (server selection, job assignment, result checks)
// - Depends on: tokio, tokio-util, crossbeam, log, crate::source, crate::miner::worker

use crate::core::server::{Scheme, Server};
use crate::core::types::{FailoverPolicy, Job, MinerOptions, WorkResult};
use crate::miner::error::MinerError;
use crate::miner::stats::{MinerStats, ThreadStats};
use crate::miner::worker::{nonce_range, Assignment, Worker, WorkerLink, WorkerStatus};
use crate::source::{SourceError, SourceExit, WorkSource};
use crossbeam::channel::{unbounded, Sender};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "graxil::dispatcher";

/// Pause before reopening a server whose source stopped on an error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Usable,
    /// Credentials rejected. Never retried.
    AuthFailed,
    /// The server asked miners to use stratum on this host instead.
    Diverted(String),
    /// Configured with a scheme this miner does not speak.
    Unsupported,
}

impl ServerStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, ServerStatus::Usable)
    }
}

/// What a connection outcome did to server selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerChange {
    Unchanged,
    Switched(Arc<Server>),
    /// No usable server remains.
    Exhausted,
}

impl ServerChange {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ServerChange::Unchanged)
    }
}

struct ServerSlot {
    server: Arc<Server>,
    errors: u32,
    status: ServerStatus,
    checked_stratum: bool,
}

struct WorkerSlot {
    id: usize,
    name: String,
    worker: Box<dyn Worker>,
    assignments: Sender<Assignment>,
    status: Arc<WorkerStatus>,
    current: Option<Arc<Job>>,
}

struct DispatchState {
    servers: Vec<ServerSlot>,
    current: usize,
    last_failback: Instant,
    halted: bool,
    workers: Vec<WorkerSlot>,
    next_worker_id: usize,
    ever_assigned: bool,
}

impl DispatchState {
    fn current_server(&self) -> &Arc<Server> {
        &self.servers[self.current].server
    }

    fn failback_due(&self, policy: &FailoverPolicy) -> bool {
        self.current != 0
            && self.servers[0].status.is_usable()
            && self.last_failback.elapsed() >= policy.failback
    }

    /// Make `index` current. Work from the previous server is stale, so
    /// every worker is flagged for an update.
    fn switch_to(&mut self, index: usize) -> Arc<Server> {
        self.current = index;
        self.servers[index].errors = 0;
        self.last_failback = Instant::now();
        for worker in &self.workers {
            worker.status.request_update();
        }
        self.servers[index].server.clone()
    }

    /// Move to the next usable server after the current one.
    fn advance(&mut self, wrap: bool) -> ServerChange {
        let count = self.servers.len();
        let mut index = self.current;
        for _ in 0..count {
            index += 1;
            if index >= count {
                if !wrap {
                    break;
                }
                index = 0;
            }
            if self.servers[index].status.is_usable() {
                return ServerChange::Switched(self.switch_to(index));
            }
        }
        self.halted = true;
        ServerChange::Exhausted
    }

    fn slot_of(&mut self, server: &Arc<Server>) -> Option<&mut ServerSlot> {
        self.servers.iter_mut().find(|slot| Arc::ptr_eq(&slot.server, server))
    }

    /// Send `job` to each worker picked by `select`, splitting the nonce space
    /// by pool position.
    fn hand_out(&mut self, job: &Arc<Job>, select: impl Fn(&WorkerSlot) -> bool) -> usize {
        let count = self.workers.len();
        let mut assigned = 0;
        for (index, slot) in self.workers.iter_mut().enumerate() {
            if !select(slot) {
                continue;
            }
            slot.status.clear_update();
            let assignment = Assignment {
                job: job.clone(),
                range: nonce_range(index, count),
            };
            if slot.assignments.send(assignment).is_err() {
                warn!(target: LOG_TARGET, "Worker {} ({}) is not listening for work", slot.id, slot.name);
                continue;
            }
            slot.current = Some(job.clone());
            assigned += 1;
        }
        if assigned > 0 {
            self.ever_assigned = true;
        }
        assigned
    }
}

/// Owner of server selection, worker pool and result checking.
///
/// All shared state sits behind one lock; no method holds it across an await.
pub struct Dispatcher {
    state: Mutex<DispatchState>,
    policy: FailoverPolicy,
    options: MinerOptions,
    stats: Arc<MinerStats>,
    results_tx: UnboundedSender<WorkResult>,
    results_rx: AsyncMutex<UnboundedReceiver<WorkResult>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(servers: Vec<Server>, policy: FailoverPolicy, options: MinerOptions) -> Result<Arc<Self>, MinerError> {
        if servers.is_empty() {
            return Err(MinerError::NoServers);
        }
        if policy.tolerance == 0 {
            return Err(MinerError::Config("tolerance must be at least 1".to_string()));
        }
        let servers = servers
            .into_iter()
            .map(|server| ServerSlot {
                server: Arc::new(server),
                errors: 0,
                status: ServerStatus::Usable,
                checked_stratum: false,
            })
            .collect();
        let (results_tx, results_rx) = unbounded_channel();
        Ok(Arc::new(Self {
            state: Mutex::new(DispatchState {
                servers,
                current: 0,
                last_failback: Instant::now(),
                halted: false,
                workers: Vec::new(),
                next_worker_id: 0,
                ever_assigned: false,
            }),
            policy,
            options,
            stats: Arc::new(MinerStats::new()),
            results_tx,
            results_rx: AsyncMutex::new(results_rx),
            shutdown: CancellationToken::new(),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn options(&self) -> &MinerOptions {
        &self.options
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    pub fn stats(&self) -> Arc<MinerStats> {
        self.stats.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the session: every source and loop winds down.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Server to fetch work from, failing back to the primary when due.
    /// None once every server is exhausted.
    pub fn select_server(&self) -> Option<Arc<Server>> {
        let mut state = self.lock();
        if state.halted {
            return None;
        }
        if state.failback_due(&self.policy) {
            info!(target: LOG_TARGET, "↩️  Failing back to primary {}", state.servers[0].server);
            state.switch_to(0);
        }
        if state.servers[state.current].status.is_usable() {
            return Some(state.current_server().clone());
        }
        match state.advance(self.policy.wrap) {
            ServerChange::Switched(server) => Some(server),
            _ => None,
        }
    }

    /// True when the primary should be retried now.
    pub fn failback_due(&self) -> bool {
        self.lock().failback_due(&self.policy)
    }

    /// Track consecutive connection errors on the current server, failing
    /// over once `tolerance` is reached. Reports from a server that is no
    /// longer current are ignored.
    pub fn record_connection_outcome(&self, server: &Arc<Server>, ok: bool) -> ServerChange {
        let mut state = self.lock();
        if state.halted {
            return ServerChange::Exhausted;
        }
        if !Arc::ptr_eq(server, state.current_server()) {
            debug!(target: LOG_TARGET, "Ignoring connection outcome from {}: not the current server", server);
            return ServerChange::Unchanged;
        }
        let current = state.current;
        if ok {
            state.servers[current].errors = 0;
            return ServerChange::Unchanged;
        }

        state.servers[current].errors += 1;
        let errors = state.servers[current].errors;
        if errors < self.policy.tolerance {
            debug!(target: LOG_TARGET, "{} connection error(s) on {}", errors, state.servers[current].server);
            return ServerChange::Unchanged;
        }

        state.servers[current].errors = 0;
        let change = state.advance(self.policy.wrap);
        match &change {
            ServerChange::Switched(server) => {
                warn!(target: LOG_TARGET, "🔀 Failing over to {} after {} connection errors", server, errors)
            }
            ServerChange::Exhausted => error!(target: LOG_TARGET, "No usable server left after {} errors", errors),
            ServerChange::Unchanged => {}
        }
        change
    }

    /// True while `server` is the one work is fetched from.
    pub fn is_current(&self, server: &Arc<Server>) -> bool {
        let state = self.lock();
        !state.halted && Arc::ptr_eq(server, state.current_server())
    }

    pub fn set_server_status(&self, server: &Arc<Server>, status: ServerStatus) {
        let mut state = self.lock();
        if let Some(slot) = state.slot_of(server) {
            slot.status = status;
        }
    }

    fn mark_stratum_checked(&self, server: &Arc<Server>) {
        if let Some(slot) = self.lock().slot_of(server) {
            slot.checked_stratum = true;
        }
    }

    fn is_stratum_checked(&self, server: &Arc<Server>) -> bool {
        self.lock().slot_of(server).is_some_and(|slot| slot.checked_stratum)
    }

    pub fn has_updatable_workers(&self) -> bool {
        self.lock().workers.iter().any(|w| w.status.wants_update())
    }

    /// Give `job` to every worker that asked for new work. Jobs from a server
    /// that is no longer current are dropped.
    pub fn assign_work(&self, job: Arc<Job>) -> usize {
        let mut state = self.lock();
        if state.halted || !Arc::ptr_eq(&job.server, state.current_server()) {
            debug!(target: LOG_TARGET, "Dropping job from {}: not the current server", job.server);
            return 0;
        }
        self.stats.jobs_received.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let assigned = state.hand_out(&job, |slot| slot.status.wants_update());
        if assigned > 0 {
            info!(target: LOG_TARGET,
                "📋 New job from {}: height {}, {} transactions, {} worker(s)",
                job.server.name(),
                job.height,
                job.transactions.len(),
                assigned
            );
        }
        assigned
    }

    /// Replace every worker's job, flagged or not. Used when the chain tip moved.
    pub fn supersede_work(&self, job: Arc<Job>) -> usize {
        let mut state = self.lock();
        if state.halted || !Arc::ptr_eq(&job.server, state.current_server()) {
            debug!(target: LOG_TARGET, "Dropping superseding job from {}: not the current server", job.server);
            return 0;
        }
        self.stats.jobs_received.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        state.hand_out(&job, |_| true)
    }

    /// Check a worker result against its own job's target and submit it.
    ///
    /// Returns Ok(true) only when the provider accepted the block. Transport
    /// failures during submission drop the result; it is never resubmitted.
    pub async fn accept_result(&self, source: &dyn WorkSource, result: WorkResult) -> Result<bool, SourceError> {
        use std::sync::atomic::Ordering;

        self.stats.candidates_checked.fetch_add(1, Ordering::Relaxed);
        let job = &result.job;
        if !job.meets_target(result.ntime, result.nonce) {
            self.stats.candidates_below_target.fetch_add(1, Ordering::Relaxed);
            debug!(target: LOG_TARGET,
                "Worker {} result {:08x}/{:08x} is below target",
                result.worker, result.ntime, result.nonce
            );
            return Ok(false);
        }
        if !job.mark_submitted(result.ntime, result.nonce) {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(target: LOG_TARGET, "Duplicate result {:08x}/{:08x} discarded", result.ntime, result.nonce);
            return Ok(false);
        }

        let mut hash = job.hash(result.ntime, result.nonce);
        hash.reverse();
        info!(target: LOG_TARGET,
            "💎 Worker {} solved block {} at height {}",
            result.worker,
            hex::encode(hash),
            job.height
        );

        let server = source.server();
        if !Arc::ptr_eq(&server, &job.server) {
            info!(target: LOG_TARGET, "Block was built from {}, submitting to {}", job.server.name(), server.name());
        }

        if self.options.propose {
            if let Err(e) = source.propose_block(job, result.ntime, result.nonce).await {
                warn!(target: LOG_TARGET, "Proposal to {} failed: {}", server.name(), e);
            }
        }

        match source.submit_block(job, result.ntime, result.nonce).await {
            Ok(None) => {
                info!(target: LOG_TARGET, "🎉 Block accepted by {}", server.name());
                self.stats.record_block(job.height, &server.name(), true, None);
                Ok(true)
            }
            Ok(Some(reason)) => {
                warn!(target: LOG_TARGET, "❌ Block rejected by {}: {}", server.name(), reason);
                self.stats.record_block(job.height, &server.name(), false, Some(reason));
                Ok(false)
            }
            Err(e) if e.is_transient() => {
                error!(target: LOG_TARGET, "Submission to {} failed, block dropped: {}", server.name(), e);
                self.stats.record_block(job.height, &server.name(), false, Some(e.to_string()));
                self.record_connection_outcome(&server, false);
                Ok(false)
            }
            Err(e) => {
                self.stats.record_block(job.height, &server.name(), false, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Attach and start a worker. Returns its id.
    pub fn add_worker(&self, mut worker: Box<dyn Worker>) -> Result<usize, MinerError> {
        let (assignments, receiver) = unbounded();
        let status = Arc::new(WorkerStatus::default());
        let mut state = self.lock();
        let id = state.next_worker_id;
        let stats: Arc<ThreadStats> = self.stats.register_worker(id);
        let link = WorkerLink {
            id,
            assignments: receiver,
            results: self.results_tx.clone(),
            status: status.clone(),
            stats,
            max_update_time: self.options.max_update_time,
        };
        if let Err(e) = worker.start(link) {
            self.stats.unregister_worker(id);
            return Err(e);
        }
        status.set_running(true);
        state.next_worker_id += 1;
        let name = worker.name();
        info!(target: LOG_TARGET, "🧵 Added worker {} ({})", id, name);
        state.workers.push(WorkerSlot {
            id,
            name,
            worker,
            assignments,
            status,
            current: None,
        });
        Ok(id)
    }

    /// Detach a worker, stopping it and waiting for it to finish.
    pub fn remove_worker(&self, id: usize) -> Result<(), MinerError> {
        let slot = {
            let mut state = self.lock();
            let index = state
                .workers
                .iter()
                .position(|w| w.id == id)
                .ok_or_else(|| MinerError::Worker(format!("no worker with id {}", id)))?;
            state.workers.remove(index)
        };
        let WorkerSlot {
            name,
            mut worker,
            assignments,
            status,
            ..
        } = slot;
        // Disconnecting the channel wakes a worker idling on it.
        drop(assignments);
        worker.stop();
        status.set_running(false);
        self.stats.unregister_worker(id);
        info!(target: LOG_TARGET, "Removed worker {} ({})", id, name);
        Ok(())
    }

    pub fn stop_workers(&self) {
        let ids: Vec<usize> = self.lock().workers.iter().map(|w| w.id).collect();
        for id in ids {
            let _ = self.remove_worker(id);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn worker_ids(&self) -> Vec<usize> {
        self.lock().workers.iter().map(|w| w.id).collect()
    }

    /// Job most recently handed to worker `id`.
    pub fn worker_job(&self, id: usize) -> Option<Arc<Job>> {
        self.lock().workers.iter().find(|w| w.id == id).and_then(|w| w.current.clone())
    }

    pub fn current_index(&self) -> usize {
        self.lock().current
    }

    pub fn current_server(&self) -> Arc<Server> {
        self.lock().current_server().clone()
    }

    pub fn server_errors(&self, index: usize) -> u32 {
        self.lock().servers.get(index).map_or(0, |slot| slot.errors)
    }

    pub fn server_status(&self, index: usize) -> Option<ServerStatus> {
        self.lock().servers.get(index).map(|slot| slot.status.clone())
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    pub fn ever_assigned(&self) -> bool {
        self.lock().ever_assigned
    }

    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// Drive sources until shutdown or until no server is left.
    ///
    /// `open` builds the source for a server each time it becomes current.
    pub async fn run<F>(self: &Arc<Self>, open: F) -> Result<(), MinerError>
    where
        F: Fn(Arc<Server>) -> Arc<dyn WorkSource>,
    {
        if self.worker_count() == 0 {
            return Err(MinerError::NoWorkers);
        }
        let mut results = self.results_rx.lock().await;

        let summary_stop = self.shutdown.child_token();
        let summary = {
            let this = self.clone();
            let stop = summary_stop.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.options.stats_interval);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = interval.tick() => this.stats.display_summary(&this.current_server().name()),
                    }
                }
            })
        };

        let outcome = loop {
            if self.shutdown.is_cancelled() {
                break Ok(());
            }
            let Some(server) = self.select_server() else {
                break Err(if self.ever_assigned() {
                    MinerError::NoViableSource
                } else {
                    MinerError::NoWorkReceived
                });
            };

            if server.scheme == Scheme::Stratum {
                warn!(target: LOG_TARGET, "Skipping {}: stratum is not supported", server);
                self.set_server_status(&server, ServerStatus::Unsupported);
                continue;
            }

            let source = open(server.clone());

            if self.options.stratum_detect && !self.is_stratum_checked(&server) {
                match source.detect_alternate_protocol().await {
                    Ok(None) => self.mark_stratum_checked(&server),
                    Ok(Some(host)) if host == server.host => {
                        warn!(target: LOG_TARGET, "No response from {}", server);
                        self.record_connection_outcome(&server, false);
                        self.pause(RETRY_DELAY).await;
                        continue;
                    }
                    Ok(Some(host)) => {
                        warn!(target: LOG_TARGET, "{} diverts miners to stratum on {}; skipping it", server, host);
                        self.set_server_status(&server, ServerStatus::Diverted(host));
                        continue;
                    }
                    Err(SourceError::NotAuthorized) => {
                        self.set_server_status(&server, ServerStatus::AuthFailed);
                        continue;
                    }
                    Err(SourceError::Cancelled) => continue,
                    Err(e) => {
                        warn!(target: LOG_TARGET, "Stratum check of {} failed: {}", server, e);
                        self.record_connection_outcome(&server, false);
                        self.pause(RETRY_DELAY).await;
                        continue;
                    }
                }
            }

            match source.run(&mut results).await {
                SourceExit::Failback | SourceExit::FailedOver | SourceExit::Shutdown => {}
                SourceExit::AuthFailed => {
                    warn!(target: LOG_TARGET, "Giving up on {}: not authorized", server);
                    self.set_server_status(&server, ServerStatus::AuthFailed);
                }
                SourceExit::Stopped(e) => {
                    warn!(target: LOG_TARGET, "Source {} stopped: {}", server, e);
                    self.record_connection_outcome(&server, false);
                    self.pause(RETRY_DELAY).await;
                }
            }
        };

        summary_stop.cancel();
        let _ = summary.await;
        if let Err(e) = &outcome {
            error!(target: LOG_TARGET, "Mining stopped: {}", e);
        }
        outcome
    }
}


// Changelog:
// - v1.3.0 (2025-07-09): Connection outcomes are tied to their server.
//   - record_connection_outcome ignores servers that are no longer current.
//   - is_current lets a source notice it has been failed over.
//   - Switching servers flags every worker for new work.
// - v1.2.0 (2025-07-07): Stratum detection and statistics summary.
//   - Servers are checked once for a stratum diversion header.
//   - Summary logged every stats_interval while running.
// - v1.1.0 (2025-07-06): Worker pool management.
//   - add_worker/remove_worker with stop-and-join on removal.
//   - Nonce space partitioned by pool position on every assignment.
// - v1.0.0 (2025-07-05): Initial dispatcher.
//   - Failover after tolerance errors, failback after the cooldown.
