// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/error.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the errors that end a mining session or reject a
// dispatcher configuration.
//
// Tree Location:
// - src/miner/error.rs (miner errors)
// - Depends on: thiserror

use crate::core::error::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("no servers configured")]
    NoServers,

    #[error("no workers attached")]
    NoWorkers,

    /// Every server failed, was refused or was diverted and wrapping is off.
    #[error("no usable work source left")]
    NoViableSource,

    /// The session ended without any work ever reaching a worker.
    #[error("no work was received from any server")]
    NoWorkReceived,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// Changelog:
// - v1.0.0 (2025-07-05): Miner session errors.
