// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/script.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the low-level consensus encodings shared by scripts and
// transactions: canonical data pushes, the wire variable-length integer and
// the BIP34 coinbase height.
//
// Tree Location:
// - src/core/script.rs (script and integer encodings)
// - Depends on: std

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Push `data` onto a script using the canonical opcode for its size.
pub fn push_script(data: &[u8]) -> Vec<u8> {
    match data {
        [] | [0] => vec![OP_0],
        [n @ 1..=16] => vec![OP_1 - 1 + n],
        [0x81] => vec![OP_1NEGATE],
        _ => {
            let mut script = op_push(data.len());
            script.extend_from_slice(data);
            script
        }
    }
}

/// Length prefix for a data push of `len` bytes.
pub fn op_push(len: usize) -> Vec<u8> {
    if len < OP_PUSHDATA1 as usize {
        vec![len as u8]
    } else if len <= 0xff {
        vec![OP_PUSHDATA1, len as u8]
    } else if len <= 0xffff {
        let mut push = vec![OP_PUSHDATA2];
        push.extend_from_slice(&(len as u16).to_le_bytes());
        push
    } else {
        let mut push = vec![OP_PUSHDATA4];
        push.extend_from_slice(&(len as u32).to_le_bytes());
        push
    }
}

/// Wire variable-length integer ("CompactSize").
pub fn var_int(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut v = vec![0xfd];
        v.extend_from_slice(&(n as u16).to_le_bytes());
        v
    } else if n <= 0xffff_ffff {
        let mut v = vec![0xfe];
        v.extend_from_slice(&(n as u32).to_le_bytes());
        v
    } else {
        let mut v = vec![0xff];
        v.extend_from_slice(&n.to_le_bytes());
        v
    }
}

/// Decode a variable-length integer, returning the value and bytes consumed.
pub fn decode_var_int(bytes: &[u8]) -> Option<(u64, usize)> {
    let (&prefix, rest) = bytes.split_first()?;
    let width = match prefix {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Some((n as u64, 1)),
    };
    let payload = rest.get(..width)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(payload);
    Some((u64::from_le_bytes(buf), 1 + width))
}

/// Minimal signed little-endian height, prefixed by its length.
///
/// A spare high bit is always reserved so the number never reads as negative.
pub fn encode_coinbase_height(height: u64) -> Vec<u8> {
    let bit_length = (u64::BITS - height.leading_zeros()) as usize;
    let len = (bit_length + 8) / 8;
    let bytes = height.to_le_bytes();
    let mut encoded = Vec::with_capacity(len + 1);
    encoded.push(len as u8);
    encoded.extend_from_slice(&bytes[..len.min(8)]);
    // Heights with bit 63 set need a ninth, zero sign byte.
    encoded.resize(len + 1, 0);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_use_single_opcodes() {
        assert_eq!(push_script(&[]), vec![OP_0]);
        assert_eq!(push_script(&[0]), vec![OP_0]);
        for n in 1..=16u8 {
            assert_eq!(push_script(&[n]), vec![0x50 + n]);
        }
        assert_eq!(push_script(&[0x81]), vec![OP_1NEGATE]);
        assert_eq!(push_script(&[17]), vec![1, 17]);
    }

    #[test]
    fn push_length_prefixes() {
        assert_eq!(push_script(&[7u8; 75])[..1], [75]);
        assert_eq!(push_script(&[7u8; 76])[..2], [OP_PUSHDATA1, 76]);
        assert_eq!(push_script(&[7u8; 255])[..2], [OP_PUSHDATA1, 0xff]);
        assert_eq!(push_script(&[7u8; 256])[..3], [OP_PUSHDATA2, 0x00, 0x01]);
        assert_eq!(push_script(&vec![7u8; 65535])[..3], [OP_PUSHDATA2, 0xff, 0xff]);
        assert_eq!(
            push_script(&vec![7u8; 65536])[..5],
            [OP_PUSHDATA4, 0x00, 0x00, 0x01, 0x00]
        );
        assert_eq!(push_script(&vec![7u8; 65536]).len(), 65536 + 5);
    }

    #[test]
    fn var_int_boundaries() {
        assert_eq!(var_int(0xfc), vec![0xfc]);
        assert_eq!(var_int(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(var_int(0xffff), vec![0xfd, 0xff, 0xff]);
        assert_eq!(var_int(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(var_int(0x1_0000_0000).len(), 9);
        for n in [0, 0xfc, 0xfd, 0xffff, 0x10000, 0xffff_ffff, 0x1_0000_0000, u64::MAX] {
            let encoded = var_int(n);
            assert_eq!(decode_var_int(&encoded), Some((n, encoded.len())));
        }
        assert_eq!(decode_var_int(&[0xfe, 0x01]), None);
        assert_eq!(decode_var_int(&[]), None);
    }

    #[test]
    fn coinbase_heights() {
        let cases: [(u64, &str); 10] = [
            (0, "0100"),
            (1, "0101"),
            (16, "0110"),
            (127, "017f"),
            (128, "028000"),
            (255, "02ff00"),
            (256, "020001"),
            (840000, "0340d10c"),
            (8388607, "03ffff7f"),
            (8388608, "0400008000"),
        ];
        for (height, expected) in cases {
            assert_eq!(hex::encode(encode_coinbase_height(height)), expected, "height {}", height);
        }
        assert_eq!(encode_coinbase_height(u64::MAX).len(), 10);
    }
}

// Changelog:
// - v1.0.0 (2025-07-02): Initial script and integer encodings.
//   - push_script/op_push follow the canonical script-builder thresholds.
//   - var_int/decode_var_int implement CompactSize.
//   - encode_coinbase_height emits the minimal signed height push.
