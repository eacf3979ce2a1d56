// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the core of the miner: hashing,
// targets, script and address encoding, transactions, servers and the shared
// data types.
//
// Tree Location:
// - src/core/mod.rs (core module entry point)
// - Submodules: address, difficulty, error, script, server, sha256, transaction, types

pub mod address;
pub mod difficulty;
pub mod error;
pub mod script;
pub mod server;
pub mod sha256;
pub mod transaction;
pub mod types;

pub use address::{decode_address, Network};
pub use difficulty::{bits_to_target, calculate_difficulty, hash_meets_target, U256};
pub use error::CodecError;
pub use server::{Scheme, Server};
pub use sha256::{sha256d, sha256d_hash, HeaderHasher};
pub use transaction::{build_generation_transaction, merkle_root, GenerationTx};
pub use types::{Args, BlockTemplate, FailoverPolicy, Job, MinerConfig, MinerOptions, WorkResult};

// Changelog:
// - v2.0.0 (2025-07-02): Reorganized for solo block templates.
//   - Added address, script, transaction, server and error modules.
//   - Removed SHA3x hashing.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
