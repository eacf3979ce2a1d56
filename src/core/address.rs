// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/address.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file decodes payout addresses into output scripts for the generation
// transaction. Base58Check (P2PKH/P2SH) and Bech32/Bech32m segwit addresses
// are accepted for mainnet and testnet.
//
// Tree Location:
// - src/core/address.rs (address to script decoding)
// - Depends on: bs58, bitcoin (bech32), crate::core::script

use crate::core::error::CodecError;
use crate::core::script::{
    push_script, OP_0, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160,
};
use bitcoin::bech32::segwit;

/// Chain parameters needed to recognise payout addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0,
            Network::Testnet => 111,
        }
    }

    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => 5,
            Network::Testnet => 196,
        }
    }

    pub fn segwit_hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }
}

/// A decoded segwit output: witness version and program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessProgram {
    pub version: u8,
    pub program: Vec<u8>,
}

/// Decode `address` into the script that pays it.
pub fn decode_address(address: &str, network: Network) -> Result<Vec<u8>, CodecError> {
    let hrp = network.segwit_hrp();
    let looks_segwit = address
        .get(..hrp.len() + 1)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&format!("{}1", hrp)));
    if looks_segwit {
        let witness = segwit_decode(hrp, address)?;
        return Ok(witness_script(&witness));
    }

    let (version, hash160) = base58check_decode(address)?;
    let mut script = Vec::with_capacity(25);
    if version == network.p2pkh_version() {
        script.extend_from_slice(&[OP_DUP, OP_HASH160]);
        script.extend(push_script(&hash160));
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    } else if version == network.p2sh_version() {
        script.push(OP_HASH160);
        script.extend(push_script(&hash160));
        script.push(OP_EQUAL);
    } else {
        return Err(invalid(address, &format!("unknown address version {}", version)));
    }
    Ok(script)
}

/// Output script for a witness program: `OP_n <program>`.
pub fn witness_script(witness: &WitnessProgram) -> Vec<u8> {
    let op_n = if witness.version == 0 { OP_0 } else { witness.version + 0x50 };
    let mut script = vec![op_n];
    script.extend(push_script(&witness.program));
    script
}

/// Base58Check decode to (version byte, 20-byte hash), validating the checksum.
pub fn base58check_decode(address: &str) -> Result<(u8, Vec<u8>), CodecError> {
    let payload = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| invalid(address, &e.to_string()))?;
    if payload.len() != 21 {
        return Err(invalid(address, &format!("payload is {} bytes", payload.len())));
    }
    Ok((payload[0], payload[1..].to_vec()))
}

/// Decode a segwit address for the given human-readable part. Checksum
/// variant, witness version and program length are validated by the bech32
/// decoder; the prefix and length limits are checked again here.
pub fn segwit_decode(hrp: &str, address: &str) -> Result<WitnessProgram, CodecError> {
    let (got_hrp, version, program) = segwit::decode(address).map_err(|e| invalid(address, &e.to_string()))?;
    if got_hrp.to_lowercase() != hrp {
        return Err(invalid(address, &format!("expected prefix {}", hrp)));
    }
    let version = version.to_u8();
    if version > 16 {
        return Err(invalid(address, &format!("witness version {}", version)));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(invalid(address, &format!("witness program is {} bytes", program.len())));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(invalid(address, "version 0 program must be 20 or 32 bytes"));
    }
    Ok(WitnessProgram { version, program })
}

fn invalid(address: &str, reason: &str) -> CodecError {
    CodecError::InvalidAddress(format!("{} ({})", address, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_is_rejected() {
        assert!(segwit_decode("bc", "bc1qW508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").is_err());
        let upper = segwit_decode("bc", "BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4").unwrap();
        assert_eq!(upper.version, 0);
        assert_eq!(hex::encode(upper.program), "751e76e8199196d454941c45d1b3a323f1433bd6");
    }

    #[test]
    fn witness_v1_with_bech32_checksum_is_rejected() {
        // BIP350: v1 program carrying a Bech32 checksum.
        assert!(segwit_decode("bc", "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqh2y7hd").is_err());
    }

    #[test]
    fn testnet_segwit_uses_tb_prefix() {
        let script = decode_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Testnet).unwrap();
        assert_eq!(hex::encode(script), "0014751e76e8199196d454941c45d1b3a323f1433bd6");
        assert!(decode_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Mainnet).is_err());
    }

    #[test]
    fn taproot_requires_bech32m() {
        let witness = segwit_decode(
            "bc",
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0",
        )
        .unwrap();
        assert_eq!(witness.version, 1);
        assert_eq!(witness.program.len(), 32);
    }
}

// Changelog:
// - v1.1.0 (2025-07-09): Segwit decoding through bitcoin::bech32.
//   - Removed the local polymod and bit conversion code.
// - v1.0.1 (2025-07-04): Accept Bech32m checksums for witness v1+ (BIP350).
// - v1.0.0 (2025-07-02): Initial address decoding.
//   - Base58Check via bs58 with checksum validation.
//   - Bech32 segwit decoding with HRP, version and program length checks.
