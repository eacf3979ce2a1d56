// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/sha256.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the SHA256d (double SHA-256) primitive used for block
// headers, transaction ids and merkle nodes, plus a midstate header hasher
// the CPU worker uses for nonce iteration.

use sha2::{Digest, Sha256};
use core::array;

/// Double SHA-256 of arbitrary data, in internal (digest) byte order.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Double SHA-256 of an 80-byte serialized block header.
pub fn sha256d_hash(header: &[u8; 80]) -> [u8; 32] {
    sha256d(header)
}

/// Hashes one header template for many nonces.
///
/// The first 64 bytes of a header never change while a nonce range is
/// searched, so their compression state is computed once and cloned.
#[derive(Clone)]
pub struct HeaderHasher {
    midstate: Sha256,
    tail: [u8; 16],
}

impl HeaderHasher {
    pub fn new(header: &[u8; 80]) -> Self {
        let mut midstate = Sha256::new();
        midstate.update(&header[..64]);
        let mut tail = [0u8; 16];
        tail.copy_from_slice(&header[64..]);
        Self { midstate, tail }
    }

    /// Replace the time field (header bytes 68..72) without touching the midstate.
    pub fn set_time(&mut self, ntime: u32) {
        self.tail[4..8].copy_from_slice(&ntime.to_le_bytes());
    }

    pub fn hash(&self, nonce: u32) -> [u8; 32] {
        let mut tail = self.tail;
        tail[12..16].copy_from_slice(&nonce.to_le_bytes());
        let mut hasher = self.midstate.clone();
        hasher.update(tail);
        let first = hasher.finalize();
        Sha256::digest(first).into()
    }

    pub fn hash_batch(&self, start_nonce: u32) -> [([u8; 32], u32); 4] {
        array::from_fn(|i| {
            let nonce = start_nonce.wrapping_add(i as u32);
            (self.hash(nonce), nonce)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midstate_matches_full_hash() {
        let mut header = [0u8; 80];
        for (i, byte) in header.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let hasher = HeaderHasher::new(&header);
        header[76..80].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(hasher.hash(7), sha256d_hash(&header));

        let batch = hasher.hash_batch(7);
        assert_eq!(batch[0], (sha256d_hash(&header), 7));
        assert_eq!(batch[3].1, 10);
    }

    #[test]
    fn set_time_patches_time_field() {
        let header = [0u8; 80];
        let mut hasher = HeaderHasher::new(&header);
        hasher.set_time(0x5f5e_1000);

        let mut expected = header;
        expected[68..72].copy_from_slice(&0x5f5e_1000u32.to_le_bytes());
        assert_eq!(hasher.hash(0), sha256d_hash(&expected));
    }
}

// Changelog:
// - v2.0.0 (2025-07-02): Reworked for solo block templates.
//   - Added generic sha256d used by transactions and merkle trees.
//   - Replaced the copy-per-nonce batch with a midstate HeaderHasher.
// - v1.0.4 (2025-06-18): Fixed type mismatches and compilation errors.
