// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/worker.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the contract between the dispatcher and hashing workers:
// the Worker trait, the assignment a worker receives (job plus nonce range),
// and the link a worker holds to receive work, report results and flag that
// it wants new work.
//
// Tree Location:
// - src/miner/worker.rs (worker contract)
// - Depends on: crossbeam, tokio, crate::core::types

use crate::core::types::{Job, WorkResult};
use crate::miner::error::MinerError;
use crate::miner::stats::ThreadStats;
use crossbeam::channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Inclusive range of nonces a worker may try for one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    pub start: u32,
    pub end: u32,
}

impl NonceRange {
    pub const FULL: NonceRange = NonceRange {
        start: 0,
        end: u32::MAX,
    };

    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    pub fn contains(&self, nonce: u32) -> bool {
        nonce >= self.start && nonce <= self.end
    }
}

/// Slice `index` of the nonce space split evenly across `count` workers.
/// The last slice absorbs the remainder.
pub fn nonce_range(index: usize, count: usize) -> NonceRange {
    if count <= 1 {
        return NonceRange::FULL;
    }
    let count = count as u64;
    let index = (index as u64).min(count - 1);
    let span = (u64::from(u32::MAX) + 1) / count;
    let start = index * span;
    let end = if index == count - 1 {
        u64::from(u32::MAX)
    } else {
        start + span - 1
    };
    NonceRange {
        start: start as u32,
        end: end as u32,
    }
}

/// A job handed to one worker.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub job: Arc<Job>,
    pub range: NonceRange,
}

/// Flags shared between a worker and the dispatcher.
#[derive(Debug)]
pub struct WorkerStatus {
    update_requested: AtomicBool,
    running: AtomicBool,
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            // A fresh worker has nothing to do.
            update_requested: AtomicBool::new(true),
            running: AtomicBool::new(false),
        }
    }
}

impl WorkerStatus {
    pub fn request_update(&self) {
        self.update_requested.store(true, Ordering::Release);
    }

    pub fn wants_update(&self) -> bool {
        self.update_requested.load(Ordering::Acquire)
    }

    pub(crate) fn clear_update(&self) {
        self.update_requested.store(false, Ordering::Release);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Everything a started worker holds on to.
pub struct WorkerLink {
    pub id: usize,
    pub assignments: Receiver<Assignment>,
    pub results: UnboundedSender<WorkResult>,
    pub status: Arc<WorkerStatus>,
    pub stats: Arc<ThreadStats>,
    /// Time rolls allowed on one job before new work is requested.
    pub max_update_time: u32,
}

impl WorkerLink {
    /// Hand a candidate to the dispatcher. Returns false once the dispatcher
    /// is gone.
    pub fn report(&self, result: WorkResult) -> bool {
        self.results.send(result).is_ok()
    }

    pub fn request_update(&self) {
        self.status.request_update();
    }
}

/// A hashing backend driven by the dispatcher.
pub trait Worker: Send {
    fn name(&self) -> String;

    /// Begin hashing in the background with `link`.
    fn start(&mut self, link: WorkerLink) -> Result<(), MinerError>;

    /// Stop hashing and wait for background work to end.
    fn stop(&mut self);
}


// Changelog:
// - v1.0.0 (2025-07-05): Worker contract for the dispatcher.
//   - Worker trait, WorkerLink, Assignment and nonce partitioning.
