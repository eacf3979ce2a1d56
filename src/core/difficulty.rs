// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/difficulty.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains 256-bit target handling for SHA-256d block headers:
// compact nBits expansion, provider target parsing, the consensus hash-vs-
// target comparison and share difficulty reporting.

use crate::core::error::CodecError;
use log::{debug, warn};
use uint::construct_uint;

const LOG_TARGET: &str = "graxil::difficulty";

construct_uint! {
    pub struct U256(4);
}

/// Difficulty 1 target (0x00000000ffff0000...0000).
const MAX_TARGET: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Interpret a SHA-256d digest as the integer consensus compares.
///
/// Digests are produced in internal byte order, which is little-endian with
/// respect to the number; block explorers display them reversed.
pub fn hash_to_u256(hash: &[u8; 32]) -> U256 {
    U256::from_little_endian(hash)
}

/// Consensus proof-of-work check: the header hash must not exceed the target.
pub fn hash_meets_target(hash: &[u8; 32], target: U256) -> bool {
    let hash_value = hash_to_u256(hash);
    debug!(target: LOG_TARGET,
        "Hash check: hash={:064x}, target={:064x}",
        hash_value, target
    );
    hash_value <= target
}

/// Parse a provider `target` field (64 hex characters, most significant byte first).
pub fn target_from_hex(target_hex: &str) -> Result<U256, CodecError> {
    let bytes = hex::decode(target_hex).map_err(|e| CodecError::hex("target", e))?;
    if bytes.len() != 32 {
        return Err(CodecError::InvalidTemplate(format!(
            "target must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

/// Expand compact nBits into a full 256-bit target.
pub fn bits_to_target(bits: u32) -> U256 {
    let exponent = ((bits >> 24) & 0xFF) as usize;
    let mantissa = bits & 0x007F_FFFF;
    if mantissa == 0 {
        warn!(target: LOG_TARGET,"Invalid nbits: {:08x}, returning zero target", bits);
        return U256::zero();
    }
    let result = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else if exponent > 34 {
        warn!(target: LOG_TARGET,"nbits {:08x} overflows 256 bits, saturating", bits);
        U256::max_value()
    } else {
        U256::from(mantissa) << (8 * (exponent - 3))
    };
    debug!(target: LOG_TARGET,"nbits={:08x} -> target={:064x}", bits, result);
    result
}

/// Parse the template `bits` field (8 hex characters, big-endian u32).
pub fn parse_bits(bits_hex: &str) -> Result<u32, CodecError> {
    let bytes = hex::decode(bits_hex).map_err(|e| CodecError::hex("bits", e))?;
    let bytes: [u8; 4] = bytes
        .try_into()
        .map_err(|_| CodecError::InvalidTemplate(format!("bits must be 4 bytes: {}", bits_hex)))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Share difficulty of a digest relative to difficulty 1, saturating at u64::MAX.
pub fn calculate_difficulty(hash: &[u8; 32]) -> u64 {
    let hash_value = hash_to_u256(hash);
    if hash_value.is_zero() {
        return u64::MAX;
    }
    let quotient = U256::from_big_endian(&MAX_TARGET) / hash_value;
    if quotient > U256::from(u64::MAX) {
        u64::MAX
    } else {
        quotient.low_u64()
    }
}

/// Network difficulty represented by a target, for display.
pub fn target_to_difficulty(target: U256) -> f64 {
    if target.is_zero() {
        return f64::INFINITY;
    }
    let max_target = U256::from_big_endian(&MAX_TARGET);
    // Scale before dividing so fractional difficulties keep some precision.
    let scaled = (max_target << 20usize) / target;
    if scaled > U256::from(u64::MAX) {
        return f64::MAX;
    }
    scaled.low_u64() as f64 / (1u64 << 20) as f64
}


// Changelog:
// - v2.0.0 (2025-07-02): SHA-256d block templates only.
//   - Removed SHA3x u64 difficulty handling and the Algorithm parameter.
//   - Digests are now compared as little-endian numbers against the target.
//   - Added target_from_hex, parse_bits and target_to_difficulty.
// - v1.2.10 (2025-06-19): Fixed SHA-256 target calculation for share validation.
