// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/cpu/worker.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the CPU hashing worker. Each worker owns one OS thread
// that searches its assigned nonce range with a midstate SHA-256d hasher,
// rolls the header time once per second when the job allows it, and reports
// candidates back to the dispatcher.
//
// Tree Location:
// - src/miner/cpu/worker.rs (CPU hashing thread)
// - Depends on: crossbeam, log, crate::core::sha256, crate::miner::worker

use crate::core::difficulty::{calculate_difficulty, hash_meets_target};
use crate::core::sha256::HeaderHasher;
use crate::core::types::WorkResult;
use crate::miner::error::MinerError;
use crate::miner::worker::{Assignment, Worker, WorkerLink};
use crossbeam::channel::{RecvTimeoutError, TryRecvError};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "graxil::cpu";

/// Nonces hashed between checks for new work (in batches of four).
const NONCES_PER_PASS: u64 = 4096;
/// Ask for fresh work when this few nonces remain in the range.
const UPDATE_THRESHOLD: u64 = 1 << 20;
const IDLE_WAIT: Duration = Duration::from_millis(100);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// A hash worth sending to the dispatcher: 32 leading zero bits, or good
/// enough for the job outright (easy test networks).
pub fn is_candidate(hash: &[u8; 32], assignment: &Assignment) -> bool {
    hash[28..32] == [0, 0, 0, 0] || hash_meets_target(hash, assignment.job.target)
}

struct Search {
    assignment: Assignment,
    hasher: HeaderHasher,
    next: u64,
    ntime: u32,
    update_requested: bool,
}

impl Search {
    fn new(assignment: Assignment) -> Self {
        let ntime = assignment.job.rolled_time(0);
        let hasher = HeaderHasher::new(&assignment.job.wire_header(ntime, 0));
        let next = u64::from(assignment.range.start);
        Self {
            assignment,
            hasher,
            next,
            ntime,
            update_requested: false,
        }
    }

    fn remaining(&self) -> u64 {
        (u64::from(self.assignment.range.end) + 1).saturating_sub(self.next)
    }
}

pub struct CpuWorker {
    index: usize,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CpuWorker {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl Worker for CpuWorker {
    fn name(&self) -> String {
        format!("cpu{}", self.index)
    }

    fn start(&mut self, link: WorkerLink) -> Result<(), MinerError> {
        if self.handle.is_some() {
            return Err(MinerError::Worker(format!("{} is already running", self.name())));
        }
        self.stop.store(false, Ordering::Relaxed);
        let stop = Arc::clone(&self.stop);
        let handle = std::thread::Builder::new()
            .name(format!("graxil-cpu-{}", self.index))
            .spawn(move || mining_thread(link, stop))
            .map_err(|e| MinerError::Worker(format!("cannot spawn hashing thread: {}", e)))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(target: LOG_TARGET, "{} hashing thread panicked", self.name());
            }
        }
    }
}

impl Drop for CpuWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mining_thread(link: WorkerLink, should_stop: Arc<AtomicBool>) {
    let mut search: Option<Search> = None;
    let mut hash_count = 0u64;
    let mut last_report = Instant::now();

    loop {
        if should_stop.load(Ordering::Relaxed) {
            break;
        }

        // Only the newest assignment matters.
        let mut latest = None;
        loop {
            match link.assignments.try_recv() {
                Ok(assignment) => latest = Some(assignment),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    link.stats.update_hashrate(hash_count);
                    return;
                }
            }
        }
        if let Some(assignment) = latest {
            debug!(target: LOG_TARGET,
                "Worker {}: job at height {}, nonces {:08x}..={:08x}",
                link.id, assignment.job.height, assignment.range.start, assignment.range.end
            );
            search = Some(Search::new(assignment));
        }

        if search.is_none() {
            match link.assignments.recv_timeout(IDLE_WAIT) {
                Ok(assignment) => search = Some(Search::new(assignment)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            continue;
        }
        let Some(current) = search.as_mut() else {
            continue;
        };

        let job = Arc::clone(&current.assignment.job);
        let rolls = u32::try_from(job.age().as_secs()).unwrap_or(u32::MAX);
        let ntime = job.rolled_time(rolls);
        if ntime != current.ntime {
            current.hasher.set_time(ntime);
            current.ntime = ntime;
        }

        let end = u64::from(current.assignment.range.end);
        let pass_end = (current.next + NONCES_PER_PASS).min(end + 1);
        while current.next < pass_end {
            let batch = current.hasher.hash_batch(current.next as u32);
            for (offset, (hash, nonce)) in batch.iter().enumerate() {
                if current.next + offset as u64 > end {
                    break;
                }
                hash_count += 1;
                if is_candidate(hash, &current.assignment) {
                    let difficulty = calculate_difficulty(hash);
                    link.stats.record_candidate(difficulty);
                    info!(target: LOG_TARGET,
                        "💎 Worker {} candidate nonce {:08x} time {:08x}, difficulty {}",
                        link.id, nonce, ntime, difficulty
                    );
                    if !link.report(WorkResult::new(Arc::clone(&job), *nonce, ntime, link.id)) {
                        return;
                    }
                }
            }
            current.next += 4;
        }

        let stale = rolls >= link.max_update_time;
        if !current.update_requested && (stale || current.remaining() < UPDATE_THRESHOLD) {
            debug!(target: LOG_TARGET, "Worker {}: requesting new work", link.id);
            link.request_update();
            current.update_requested = true;
        }
        if current.remaining() == 0 {
            debug!(target: LOG_TARGET, "Worker {}: nonce range exhausted", link.id);
            link.request_update();
            search = None;
        }

        if last_report.elapsed() > REPORT_INTERVAL {
            link.stats.update_hashrate(hash_count);
            hash_count = 0;
            last_report = Instant::now();
        }
    }
    link.stats.update_hashrate(hash_count);
}


// Changelog:
// - v2.0.0 (2025-07-05): Rewritten as a dispatcher-driven CPU worker.
//   - Assignments arrive on a channel with an explicit nonce range.
//   - Midstate hashing, time rolling and update requests.
//   - Candidates go back to the dispatcher instead of a pool.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
