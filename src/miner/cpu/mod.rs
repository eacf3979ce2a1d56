// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/cpu/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for CPU hashing.
//
// Tree Location:
// - src/miner/cpu/mod.rs (CPU module entry point)
// - Submodules: worker

pub mod worker;

pub use worker::CpuWorker;

// Changelog:
// - v2.0.0 (2025-07-05): Single CpuWorker replaces the pool-driven miner.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
