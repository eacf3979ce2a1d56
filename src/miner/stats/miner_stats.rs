// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/miner_stats.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements miner-wide statistics: block submissions and their
// verdicts, candidates checked by the dispatcher, and the combined hashrate
// of all registered workers. It renders the periodic summary.
//
// Tree Location:
// - src/miner/stats/miner_stats.rs (miner-wide statistics logic)
// - Depends on: std, log, thread_stats, crate::utils::format

use super::thread_stats::ThreadStats;
use crate::utils::format::FormatUtils;
use log::info;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "graxil::stats";
const RECENT_BLOCKS: usize = 20;

#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub time: Instant,
    pub height: u64,
    pub server: String,
    pub accepted: bool,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct MinerStats {
    /// Results received from workers
    pub candidates_checked: AtomicU64,
    /// Results that missed the job target
    pub candidates_below_target: AtomicU64,
    pub duplicates: AtomicU64,
    pub blocks_submitted: AtomicU64,
    pub blocks_accepted: AtomicU64,
    pub blocks_rejected: AtomicU64,
    pub jobs_received: AtomicU64,
    start_time: Instant,
    thread_stats: Mutex<Vec<Arc<ThreadStats>>>,
    recent_blocks: Mutex<VecDeque<BlockRecord>>,
}

impl Default for MinerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MinerStats {
    pub fn new() -> Self {
        Self {
            candidates_checked: AtomicU64::new(0),
            candidates_below_target: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            blocks_submitted: AtomicU64::new(0),
            blocks_accepted: AtomicU64::new(0),
            blocks_rejected: AtomicU64::new(0),
            jobs_received: AtomicU64::new(0),
            start_time: Instant::now(),
            thread_stats: Mutex::new(Vec::new()),
            recent_blocks: Mutex::new(VecDeque::with_capacity(RECENT_BLOCKS)),
        }
    }

    /// Statistics slot for a newly attached worker.
    pub fn register_worker(&self, worker_id: usize) -> Arc<ThreadStats> {
        let stats = Arc::new(ThreadStats::new(worker_id));
        self.threads().push(stats.clone());
        stats
    }

    pub fn unregister_worker(&self, worker_id: usize) {
        self.threads().retain(|t| t.worker_id != worker_id);
    }

    fn threads(&self) -> std::sync::MutexGuard<'_, Vec<Arc<ThreadStats>>> {
        self.thread_stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_block(&self, height: u64, server: &str, accepted: bool, reason: Option<String>) {
        self.blocks_submitted.fetch_add(1, Ordering::Relaxed);
        if accepted {
            self.blocks_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.blocks_rejected.fetch_add(1, Ordering::Relaxed);
        }

        let mut blocks = self.recent_blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks.push_back(BlockRecord {
            time: Instant::now(),
            height,
            server: server.to_string(),
            accepted,
            reason,
        });
        if blocks.len() > RECENT_BLOCKS {
            blocks.pop_front();
        }
    }

    pub fn recent_blocks(&self) -> Vec<BlockRecord> {
        self.recent_blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn total_hashes(&self) -> u64 {
        self.threads()
            .iter()
            .map(|t| t.hashes_computed.load(Ordering::Relaxed))
            .sum()
    }

    pub fn get_total_hashrate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_hashes() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_active_worker_count(&self) -> usize {
        self.threads().iter().filter(|t| t.get_hashrate() > 0.0).count()
    }

    pub fn session_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log a summary of the session so far
    pub fn display_summary(&self, server: &str) {
        let hashrate = self.get_total_hashrate();
        let (workers, best) = {
            let threads = self.threads();
            let best = threads
                .iter()
                .map(|t| t.best_difficulty.load(Ordering::Relaxed))
                .max()
                .unwrap_or(0);
            (threads.len(), best)
        };
        let last_block = self
            .recent_blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .back()
            .map(|b| {
                format!(
                    "height {} {} ({})",
                    b.height,
                    if b.accepted { "accepted" } else { "rejected" },
                    FormatUtils::format_duration(b.time.elapsed())
                )
            })
            .unwrap_or_else(|| "none".to_string());

        info!(target: LOG_TARGET, "📊 MINER SUMMARY - {}", server);
        info!(target: LOG_TARGET, "├─ Hashrate: {}", FormatUtils::format_hashrate(hashrate));
        info!(target: LOG_TARGET, "├─ Total Work: {} hashes", FormatUtils::format_number(self.total_hashes()));
        info!(target: LOG_TARGET, "├─ Jobs: {}", self.jobs_received.load(Ordering::Relaxed));
        info!(target: LOG_TARGET,
            "├─ Candidates: {} ({} below target, {} duplicate)",
            self.candidates_checked.load(Ordering::Relaxed),
            self.candidates_below_target.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed)
        );
        info!(target: LOG_TARGET,
            "├─ Blocks: {}/{} accepted, {} rejected",
            self.blocks_accepted.load(Ordering::Relaxed),
            self.blocks_submitted.load(Ordering::Relaxed),
            self.blocks_rejected.load(Ordering::Relaxed)
        );
        info!(target: LOG_TARGET, "├─ Last Block: {}", last_block);
        info!(target: LOG_TARGET, "├─ Best Difficulty: {}", FormatUtils::format_number(best));
        info!(target: LOG_TARGET, "├─ Session Time: {}", FormatUtils::format_elapsed(self.session_time()));
        info!(target: LOG_TARGET, "└─ Active Workers: {}/{}", self.get_active_worker_count(), workers);
    }
}


// Changelog:
// - v2.0.0 (2025-07-05): Solo mining statistics.
//   - Share accounting replaced with block submissions and verdicts.
//   - Workers register and unregister at runtime.
//   - Dashboard reduced to a periodic summary.
// - v1.0.3 (2025-06-14): Fixed Top 5 Shares sorting.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
