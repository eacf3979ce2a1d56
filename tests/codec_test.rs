// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/codec_test.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains known-answer tests for the consensus encodings: address
// decoding, script pushes, var ints, generation transactions, merkle roots and
// the header target check against the genesis block.
//
// Tree Location:
// - tests/codec_test.rs (codec integration tests)
// - Depends on: graxil-solo, hex

#[cfg(test)]
mod tests {
    use graxil_solo::core::address::{decode_address, Network};
    use graxil_solo::core::difficulty::{bits_to_target, hash_meets_target};
    use graxil_solo::core::error::CodecError;
    use graxil_solo::core::script::{decode_var_int, push_script, var_int};
    use graxil_solo::core::sha256::{sha256d, sha256d_hash};
    use graxil_solo::core::transaction::{build_generation_transaction, merkle_root};
    use hex;

    const GENESIS_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const BECH32_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const COMMITMENT: &str = "6a24aa21a9ede2f61c3f71d1defd3fa999dfa36953755c690689799962b48bebd836974e8cf9";
    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

    fn hash32(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_p2pkh_address() {
        let script = decode_address(GENESIS_ADDRESS, Network::Mainnet).unwrap();
        assert_eq!(
            hex::encode(script),
            "76a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac",
            "P2PKH script should be OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG"
        );
    }

    #[test]
    fn test_p2sh_address() {
        let script = decode_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", Network::Mainnet).unwrap();
        assert_eq!(hex::encode(script), "a914b472a266d0bd89c13706a4132ccfb16f7c3b9fcb87");
    }

    #[test]
    fn test_bech32_address() {
        let script = decode_address(BECH32_ADDRESS, Network::Mainnet).unwrap();
        assert_eq!(hex::encode(&script), "0014751e76e8199196d454941c45d1b3a323f1433bd6");
        assert_eq!(script[0], 0x00, "Witness version should be 0");
        assert_eq!(script[1], 20, "Program should be 20 bytes");
    }

    #[test]
    fn test_corrupted_addresses_fail() {
        let bad_checksum = format!("{}5", &BECH32_ADDRESS[..BECH32_ADDRESS.len() - 1]);
        assert!(matches!(
            decode_address(&bad_checksum, Network::Mainnet),
            Err(CodecError::InvalidAddress(_))
        ));

        let bad_prefix = BECH32_ADDRESS.replacen("bc1", "tb1", 1);
        assert!(matches!(
            decode_address(&bad_prefix, Network::Mainnet),
            Err(CodecError::InvalidAddress(_))
        ));

        let bad_base58 = GENESIS_ADDRESS.replacen('A', "B", 1);
        assert!(matches!(
            decode_address(&bad_base58, Network::Mainnet),
            Err(CodecError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_push_script_opcodes() {
        assert_eq!(push_script(&[]), vec![0x00]);
        assert_eq!(push_script(&[0]), vec![0x00]);
        for n in 1..=16u8 {
            assert_eq!(push_script(&[n]), vec![0x50 + n]);
        }
        assert_eq!(push_script(&[0x81]), vec![0x4f]);
    }

    #[test]
    fn test_push_script_length_prefixes() {
        assert_eq!(push_script(&[7u8; 75])[0], 75);
        assert_eq!(&push_script(&[7u8; 76])[..2], &[0x4c, 76]);
        assert_eq!(&push_script(&[7u8; 256])[..3], &[0x4d, 0x00, 0x01]);
        assert_eq!(&push_script(&[7u8; 65536])[..5], &[0x4e, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_var_int_boundaries() {
        for n in [0u64, 0xfc, 0xfd, 0xffff, 0x10000, 0xffff_ffff, 0x1_0000_0000] {
            let encoded = var_int(n);
            assert_eq!(decode_var_int(&encoded), Some((n, encoded.len())), "var int {:#x}", n);
        }
        assert_eq!(var_int(0xfc).len(), 1);
        assert_eq!(var_int(0xfd).len(), 3);
        assert_eq!(var_int(0x10000).len(), 5);
        assert_eq!(var_int(0x1_0000_0000).len(), 9);
    }

    #[test]
    fn test_legacy_generation_transaction() {
        let generation =
            build_generation_transaction(b"graxil", GENESIS_ADDRESS, Network::Mainnet, 625_000_000, 840_000, None)
                .unwrap();
        assert_eq!(
            hex::encode(&generation.tx),
            "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff0a0340d10c67726178696cffffffff0140be4025000000001976a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac00000000"
        );
        let expected = hash32("fd1b29894a50dd680a7ab2cf4e606ab8ee0bf246b4df8a7983d984f1cc1bd5d6");
        assert_eq!(generation.consensus_hash, expected);
        assert_eq!(generation.full_hash, expected, "Legacy transactions have one hash");
    }

    #[test]
    fn test_segwit_generation_transaction() {
        let commitment = hex::decode(COMMITMENT).unwrap();
        let generation = build_generation_transaction(
            b"graxil",
            BECH32_ADDRESS,
            Network::Mainnet,
            625_000_000,
            840_000,
            Some(&commitment),
        )
        .unwrap();
        assert_eq!(
            hex::encode(&generation.tx),
            "010000000001010000000000000000000000000000000000000000000000000000000000000000ffffffff0a0340d10c67726178696cffffffff0240be402500000000160014751e76e8199196d454941c45d1b3a323f1433bd60000000000000000266a24aa21a9ede2f61c3f71d1defd3fa999dfa36953755c690689799962b48bebd836974e8cf90120000000000000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(
            generation.consensus_hash,
            hash32("91bc0db8e2002e89873cec997954c18043120379884e33e712d451b609422f8c")
        );
        assert_eq!(
            generation.full_hash,
            hash32("9d75efbc0f03aabd6120f91e37bb066fb062ee780920b6ea31c0d42a52c41cc9")
        );
        assert_ne!(generation.consensus_hash, generation.full_hash);
    }

    #[test]
    fn test_merkle_root() {
        let a = sha256d(b"a");
        let b = sha256d(b"b");
        let c = sha256d(b"c");
        assert_eq!(a, hash32("bf5d3affb73efd2ec6c36ad3112dd933efed63c4e1cbffcfa88e2759c144f2d8"));
        assert_eq!(merkle_root(&[a]), a, "A single hash is its own root");
        assert_eq!(
            merkle_root(&[a, b, c]),
            hash32("74449b8328cb6e97d305adb2fca5e90993fdf9c667fa40cb625f40508da40cbf")
        );
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c, c]), "Odd levels duplicate the last hash");
    }

    #[test]
    fn test_genesis_header_meets_target() {
        let header: [u8; 80] = hex::decode(GENESIS_HEADER).unwrap().try_into().unwrap();
        let hash = sha256d_hash(&header);
        assert_eq!(
            hex::encode(hash),
            "6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000"
        );
        assert!(hash_meets_target(&hash, bits_to_target(0x1d00ffff)));

        let mut wrong_nonce = header;
        wrong_nonce[76] ^= 1;
        assert!(!hash_meets_target(&sha256d_hash(&wrong_nonce), bits_to_target(0x1d00ffff)));
    }
}

// Changelog:
// - v1.0.0 (2025-07-03): Initial codec tests.
//   - Features: Address vectors for P2PKH, P2SH and bech32, script push and
//     var int boundaries, legacy and segwit generation transactions, merkle
//     roots and the genesis header target check.
