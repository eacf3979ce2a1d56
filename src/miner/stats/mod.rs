// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for statistics tracking. It declares
// submodules and re-exports key types for use throughout the project.
//
// Tree Location:
// - src/miner/stats/mod.rs (stats module entry point)
// - Submodules: miner_stats, thread_stats

pub mod miner_stats;
pub mod thread_stats;

pub use miner_stats::{BlockRecord, MinerStats};
pub use thread_stats::ThreadStats;

// Changelog:
// - v2.0.0 (2025-07-05): Dropped GPU information tracking.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
