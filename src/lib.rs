// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/lib.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the library root of the graxil solo miner. It declares the
// top-level modules and re-exports the types the binary and tests use.
//
// Tree Location:
// - src/lib.rs (library root)
// - Submodules: core, miner, source, utils

pub mod core;
pub mod miner;
pub mod source;
pub mod utils;

pub use crate::core::{Args, BlockTemplate, Job, MinerConfig, MinerOptions, Server, WorkResult};
pub use crate::miner::{CpuWorker, Dispatcher, MinerError, MinerStats};
pub use crate::source::{GbtSource, SourceError, WorkSource};

// Changelog:
// - v2.0.0 (2025-07-02): Library root for the solo miner.
//   - Added the source module; removed benchmark, help and pool modules.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
