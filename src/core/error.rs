// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/error.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the error type raised while turning provider templates
// and configured addresses into consensus byte sequences.
//
// Tree Location:
// - src/core/error.rs (codec errors)
// - Depends on: thiserror

use thiserror::Error;

/// Failures of the binary codec and job construction.
///
/// These describe malformed configuration or malformed provider data, so
/// callers treat them as fatal for the job being built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("no payout address configured and the provider supplied no coinbase transaction")]
    MissingAddress,

    #[error("template carries no coinbasevalue to build a generation transaction from")]
    MissingCoinbaseValue,

    #[error("invalid hex in template field {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("invalid template: {0}")]
    InvalidTemplate(String),
}

impl CodecError {
    pub(crate) fn hex(field: &'static str, err: hex::FromHexError) -> Self {
        CodecError::InvalidHex {
            field,
            reason: err.to_string(),
        }
    }
}

// Changelog:
// - v1.0.0 (2025-07-02): Initial codec error type.
//   - Covers address, coinbase and template decoding failures.
