// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the mining side: the dispatcher,
// the worker contract, the CPU worker and statistics.
//
// Tree Location:
// - src/miner/mod.rs (miner module entry point)
// - Submodules: cpu, dispatcher, error, stats, worker

pub mod cpu;
pub mod dispatcher;
pub mod error;
pub mod stats;
pub mod worker;

// Re-export key types for convenience
pub use cpu::CpuWorker;
pub use dispatcher::{Dispatcher, ServerChange, ServerStatus};
pub use error::MinerError;
pub use stats::{MinerStats, ThreadStats};
pub use worker::{nonce_range, Assignment, NonceRange, Worker, WorkerLink, WorkerStatus};

// Changelog:
// - v2.0.0 (2025-07-05): Dispatcher and worker contract for solo mining.
//   - GPU module removed.
// - v1.1.0 (2025-06-24): Added GPU mining module.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
