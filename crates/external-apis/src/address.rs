// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Address codecs
//!
//! Account-model addresses are `0x`-prefixed 20-byte hex strings, optionally carrying an
//! EIP-55 mixed-case checksum. Substrate addresses are either SS58 strings or a raw
//! `0x`-prefixed 32-byte public key. SS58 layout is `prefix ++ public key ++ checksum`
//! where the checksum is the first two bytes of `blake2b-512("SS58PRE" ++ prefix ++ key)`.

use alloy_primitives::Address;
use blake2::{Blake2b512, Digest};
use thiserror::Error;

/// SS58 network prefix used by Kusama and its parachains
pub const KUSAMA_PREFIX: u16 = 2;

const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const PUBLIC_KEY_LEN: usize = 32;
const MAX_SS58_PREFIX: u16 = 16_383;

/// 32-byte Substrate account public key
pub type PublicKey = [u8; PUBLIC_KEY_LEN];

/// Errors raised while decoding an address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not valid base58
    #[error("invalid base58: {0}")]
    Base58(String),

    /// Not valid hex
    #[error("invalid hex: {0}")]
    Hex(String),

    /// Decoded payload has the wrong size
    #[error("unexpected decoded length {0}")]
    Length(usize),

    /// The first byte is not a valid SS58 prefix
    #[error("reserved SS58 prefix byte {0}")]
    Prefix(u8),

    /// Checksum does not match the payload
    #[error("SS58 checksum mismatch")]
    Checksum,
}

/// Returns whether `address` is a well-formed account-model address
///
/// Single-case hex is accepted as is; mixed case must carry a valid EIP-55 checksum.
pub fn is_account_model_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let single_case = digits.bytes().all(|b| !b.is_ascii_uppercase())
        || digits.bytes().all(|b| !b.is_ascii_lowercase());

    single_case || Address::parse_checksummed(address, None).is_ok()
}

/// Returns whether `address` decodes to a Substrate public key
pub fn is_substrate_address(address: &str) -> bool {
    decode_substrate(address).is_ok()
}

/// Decode an SS58 string or a `0x`-prefixed 32-byte hex key into a public key
pub fn decode_substrate(address: &str) -> Result<PublicKey, AddressError> {
    let address = address.trim();
    if let Some(digits) = address.strip_prefix("0x") {
        let bytes = hex::decode(digits).map_err(|e| AddressError::Hex(e.to_string()))?;
        return PublicKey::try_from(bytes.as_slice()).map_err(|_| AddressError::Length(bytes.len()));
    }
    ss58_decode(address).map(|(_, key)| key)
}

/// Re-encode any Substrate address for the network identified by `prefix`
pub fn to_ss58(address: &str, prefix: u16) -> Result<String, AddressError> {
    decode_substrate(address).map(|key| ss58_encode(&key, prefix))
}

/// Decode an SS58 string into its network prefix and public key
pub fn ss58_decode(address: &str) -> Result<(u16, PublicKey), AddressError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;

    let first = *data.first().ok_or(AddressError::Length(0))?;
    let (prefix_len, prefix) = match first {
        0..=63 => (1, u16::from(first)),
        64..=127 => {
            let second = *data.get(1).ok_or(AddressError::Length(data.len()))?;
            let lower = (first << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (2, u16::from(lower) | (u16::from(upper) << 8))
        }
        _ => return Err(AddressError::Prefix(first)),
    };

    if data.len() != prefix_len + PUBLIC_KEY_LEN + CHECKSUM_LEN {
        return Err(AddressError::Length(data.len()));
    }

    let body_len = prefix_len + PUBLIC_KEY_LEN;
    let hash = checksum(&data[..body_len]);
    if data[body_len..] != hash[..CHECKSUM_LEN] {
        return Err(AddressError::Checksum);
    }

    let key = PublicKey::try_from(&data[prefix_len..body_len])
        .map_err(|_| AddressError::Length(data.len()))?;
    Ok((prefix, key))
}

/// Encode a public key as an SS58 string for `prefix`
///
/// Prefixes above 16383 are not representable and are masked to 14 bits.
#[allow(clippy::cast_possible_truncation)]
pub fn ss58_encode(key: &PublicKey, prefix: u16) -> String {
    let ident = prefix & MAX_SS58_PREFIX;
    let mut data = Vec::with_capacity(2 + PUBLIC_KEY_LEN + CHECKSUM_LEN);

    if ident < 64 {
        data.push(ident as u8);
    } else {
        let first = ((ident & 0b0000_0000_1111_1100) as u8) >> 2;
        let second = ((ident >> 8) as u8) | (((ident & 0b0000_0000_0000_0011) as u8) << 6);
        data.push(first | 0b0100_0000);
        data.push(second);
    }

    data.extend_from_slice(key);
    let hash = checksum(&data);
    data.extend_from_slice(&hash[..CHECKSUM_LEN]);

    bs58::encode(data).into_string()
}

fn checksum(body: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(body);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_HEX: &str = "0xd43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";
    const ALICE_GENERIC: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_KUSAMA: &str = "HNZata7iMYWmk5RvZRTiAsSDhV8366zq2YGb3tLH5Upf74F";
    const ALICE_POLKADOT: &str = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";
    const BOB_GENERIC: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";
    const BOB_KUSAMA: &str = "FoQJpPyadYccjavVdTWxpxU7rUEaYhfLCPwXgkfD6Zat9QP";

    #[test]
    fn decodes_known_accounts() {
        let (prefix, key) = ss58_decode(ALICE_GENERIC).unwrap();
        assert_eq!(prefix, 42);
        assert_eq!(format!("0x{}", hex::encode(key)), ALICE_HEX);

        let (prefix, _) = ss58_decode(ALICE_KUSAMA).unwrap();
        assert_eq!(prefix, KUSAMA_PREFIX);

        let (prefix, _) = ss58_decode(ALICE_POLKADOT).unwrap();
        assert_eq!(prefix, 0);
    }

    #[test]
    fn reencodes_for_kusama() {
        assert_eq!(to_ss58(ALICE_GENERIC, KUSAMA_PREFIX).unwrap(), ALICE_KUSAMA);
        assert_eq!(to_ss58(ALICE_HEX, KUSAMA_PREFIX).unwrap(), ALICE_KUSAMA);
        assert_eq!(to_ss58(ALICE_POLKADOT, 42).unwrap(), ALICE_GENERIC);
        assert_eq!(to_ss58(BOB_GENERIC, KUSAMA_PREFIX).unwrap(), BOB_KUSAMA);
    }

    #[test]
    fn two_byte_prefix_round_trip() {
        let key = decode_substrate(ALICE_HEX).unwrap();
        let encoded = ss58_encode(&key, 1_000);
        assert_eq!(ss58_decode(&encoded).unwrap(), (1_000, key));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut corrupted = ALICE_GENERIC.to_string();
        corrupted.pop();
        corrupted.push('Z');
        assert!(ss58_decode(&corrupted).is_err());
        assert!(!is_substrate_address(&corrupted));
    }

    #[test]
    fn substrate_predicate() {
        assert!(is_substrate_address(ALICE_GENERIC));
        assert!(is_substrate_address(ALICE_HEX));
        assert!(!is_substrate_address("0xDF67E64DC198E5287a6a625a4733841bD147E584"));
        assert!(!is_substrate_address(""));
        assert!(!is_substrate_address("not-an-address"));
    }

    #[test]
    fn account_model_predicate() {
        assert!(is_account_model_address(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        ));
        assert!(is_account_model_address(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        ));
        assert!(is_account_model_address(
            "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED"
        ));
        // one letter flipped breaks the checksum
        assert!(!is_account_model_address(
            "0x5aAeb6053f3E94C9b9A09f33669435E7Ef1BeAed"
        ));
        assert!(!is_account_model_address(ALICE_HEX));
        assert!(!is_account_model_address(ALICE_GENERIC));
        assert!(!is_account_model_address("0x1234"));
    }
}
