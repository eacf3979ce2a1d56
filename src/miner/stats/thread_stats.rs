// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/thread_stats.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements per-worker statistics: hashes computed, candidates
// reported and the best difficulty seen, with a running hashrate.
//
// Tree Location:
// - src/miner/stats/thread_stats.rs (per-worker statistics logic)
// - Depends on: std

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct ThreadStats {
    pub worker_id: usize,
    pub hashes_computed: AtomicU64,
    pub candidates_found: AtomicU64,
    pub best_difficulty: AtomicU64,
    pub peak_hashrate: AtomicU64,
    last_candidate_time: Mutex<Option<Instant>>,
    current_hashrate: Mutex<f64>,
    start_time: Instant,
}

impl ThreadStats {
    /// Create a new ThreadStats instance for a specific worker
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            hashes_computed: AtomicU64::new(0),
            candidates_found: AtomicU64::new(0),
            best_difficulty: AtomicU64::new(0),
            peak_hashrate: AtomicU64::new(0),
            last_candidate_time: Mutex::new(None),
            current_hashrate: Mutex::new(0.0),
            start_time: Instant::now(),
        }
    }

    /// Record a hash worth reporting to the dispatcher
    pub fn record_candidate(&self, difficulty: u64) {
        self.candidates_found.fetch_add(1, Ordering::Relaxed);
        *self.last_candidate_time.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.best_difficulty.fetch_max(difficulty, Ordering::Relaxed);
    }

    /// Update hashrate based on computed hashes
    pub fn update_hashrate(&self, hashes: u64) {
        let total_hashes = self.hashes_computed.fetch_add(hashes, Ordering::Relaxed) + hashes;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let current_rate = total_hashes as f64 / elapsed;
            *self.current_hashrate.lock().unwrap_or_else(|e| e.into_inner()) = current_rate;
            self.peak_hashrate.fetch_max(current_rate as u64, Ordering::Relaxed);
        }
    }

    pub fn get_hashrate(&self) -> f64 {
        *self.current_hashrate.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_peak_hashrate(&self) -> f64 {
        self.peak_hashrate.load(Ordering::Relaxed) as f64
    }

    pub fn last_candidate(&self) -> Option<Instant> {
        *self.last_candidate_time.lock().unwrap_or_else(|e| e.into_inner())
    }
}


// Changelog:
// - v2.0.0 (2025-07-05): Per-worker statistics for solo mining.
//   - Shares replaced by candidates reported to the dispatcher.
//   - Poisoned locks are recovered instead of panicking.
// - v1.0.1 (2025-06-14): Added peak hashrate tracking for benchmarking.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
