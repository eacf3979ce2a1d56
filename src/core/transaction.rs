// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/transaction.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file builds the generation (coinbase) transaction, the merkle root
// over a block's transactions and the 80-byte block header, byte-exact to
// consensus serialization.
//
// Tree Location:
// - src/core/transaction.rs (generation tx, merkle root, header layout)
// - Depends on: crate::core::{address, script, sha256}

use crate::core::address::{decode_address, Network};
use crate::core::error::CodecError;
use crate::core::script::{encode_coinbase_height, var_int};
use crate::core::sha256::sha256d;

const TX_VERSION: [u8; 4] = 1u32.to_le_bytes();
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;
const COINBASE_PREVOUT_INDEX: [u8; 4] = [0xff; 4];
const COINBASE_SEQUENCE: [u8; 4] = [0xff; 4];
const LOCK_TIME: [u8; 4] = [0; 4];

/// A serialized generation transaction and its two hashes.
///
/// `consensus_hash` (txid) commits to the serialization without witness data
/// and is what enters the merkle root. `full_hash` (wtxid) covers the bytes
/// actually transmitted; both are equal when no witness commitment is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTx {
    pub tx: Vec<u8>,
    pub consensus_hash: [u8; 32],
    pub full_hash: [u8; 32],
}

/// Build the generation transaction paying `value` to `address`.
pub fn build_generation_transaction(
    coinbase_data: &[u8],
    address: &str,
    network: Network,
    value: u64,
    height: u64,
    witness_commitment: Option<&[u8]>,
) -> Result<GenerationTx, CodecError> {
    let pubkey_script = decode_address(address, network)?;
    Ok(generation_transaction_for_script(
        coinbase_data,
        &pubkey_script,
        value,
        height,
        witness_commitment,
    ))
}

/// Build the generation transaction paying `value` to an already decoded script.
pub fn generation_transaction_for_script(
    coinbase_data: &[u8],
    pubkey_script: &[u8],
    value: u64,
    height: u64,
    witness_commitment: Option<&[u8]>,
) -> GenerationTx {
    let mut coinbase_script = encode_coinbase_height(height);
    coinbase_script.extend_from_slice(coinbase_data);

    let mut outputs = vec![tx_output(value, pubkey_script)];
    if let Some(commitment) = witness_commitment {
        outputs.push(tx_output(0, commitment));
    }

    let mut input = Vec::with_capacity(41 + coinbase_script.len());
    input.extend_from_slice(&[0u8; 32]);
    input.extend_from_slice(&COINBASE_PREVOUT_INDEX);
    input.extend(var_int(coinbase_script.len() as u64));
    input.extend_from_slice(&coinbase_script);
    input.extend_from_slice(&COINBASE_SEQUENCE);

    let mut body = Vec::new();
    body.extend(var_int(1));
    body.extend_from_slice(&input);
    body.extend(var_int(outputs.len() as u64));
    for output in &outputs {
        body.extend_from_slice(output);
    }

    let mut stripped = Vec::with_capacity(body.len() + 8);
    stripped.extend_from_slice(&TX_VERSION);
    stripped.extend_from_slice(&body);
    stripped.extend_from_slice(&LOCK_TIME);
    let consensus_hash = sha256d(&stripped);

    if witness_commitment.is_none() {
        return GenerationTx {
            tx: stripped,
            consensus_hash,
            full_hash: consensus_hash,
        };
    }

    let mut tx = Vec::with_capacity(stripped.len() + 36);
    tx.extend_from_slice(&TX_VERSION);
    tx.push(SEGWIT_MARKER);
    tx.push(SEGWIT_FLAG);
    tx.extend_from_slice(&body);
    // Coinbase witness: a single 32-byte zero "witness reserved value".
    tx.extend(var_int(1));
    tx.extend(var_int(32));
    tx.extend_from_slice(&[0u8; 32]);
    tx.extend_from_slice(&LOCK_TIME);
    let full_hash = sha256d(&tx);

    GenerationTx {
        tx,
        consensus_hash,
        full_hash,
    }
}

fn tx_output(value: u64, script: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(9 + script.len());
    output.extend_from_slice(&value.to_le_bytes());
    output.extend(var_int(script.len() as u64));
    output.extend_from_slice(script);
    output
}

/// Merkle root of transaction hashes in internal byte order.
///
/// Odd levels duplicate their last hash. An empty list yields the zero hash.
pub fn merkle_root(hashes: &[[u8; 32]]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = hashes.to_vec();
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut concat = [0u8; 64];
                concat[..32].copy_from_slice(&pair[0]);
                concat[32..].copy_from_slice(&pair[1]);
                sha256d(&concat)
            })
            .collect();
    }
    level[0]
}

/// Serialize an 80-byte block header in wire order.
pub fn block_header(
    version: u32,
    prev_hash: &[u8; 32],
    merkle_root: &[u8; 32],
    time: u32,
    bits: u32,
    nonce: u32,
) -> [u8; 80] {
    let mut header = [0u8; 80];
    header[0..4].copy_from_slice(&version.to_le_bytes());
    header[4..36].copy_from_slice(prev_hash);
    header[36..68].copy_from_slice(merkle_root);
    header[68..72].copy_from_slice(&time.to_le_bytes());
    header[72..76].copy_from_slice(&bits.to_le_bytes());
    header[76..80].copy_from_slice(&nonce.to_le_bytes());
    header
}

/// Reverse the bytes of every 4-byte word.
///
/// Converts between wire order and the big-endian message words SHA-2
/// operates on; applying it twice is the identity.
pub fn swap_words<const N: usize>(data: &[u8; N]) -> [u8; N] {
    let mut out = *data;
    for word in out.chunks_exact_mut(4) {
        word.reverse();
    }
    out
}

/// Decode a hash given in RPC display order into internal byte order.
pub fn hash_from_display_hex(field: &'static str, hash_hex: &str) -> Result<[u8; 32], CodecError> {
    let mut bytes = hex::decode(hash_hex).map_err(|e| CodecError::hex(field, e))?;
    if bytes.len() != 32 {
        return Err(CodecError::InvalidTemplate(format!(
            "{} must be 32 bytes, got {}",
            field,
            bytes.len()
        )));
    }
    bytes.reverse();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}


// Changelog:
// - v1.1.0 (2025-07-04): Header layout helpers.
//   - Added block_header, swap_words and hash_from_display_hex.
// - v1.0.0 (2025-07-02): Initial generation transaction and merkle root.
//   - Legacy and segwit generation transactions with txid/wtxid.
