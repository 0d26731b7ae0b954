// Copyright (c) 2024 The Botho Foundation

//! Account addresses.
//!
//! An address is the base32 encoding of
//! `version || ripemd160(keccak256(public_key)) || checksum`, where `version`
//! is the low byte of the network id and `checksum` is the first four bytes of
//! `keccak256(version || ripemd160(...))`. The result is always 40 characters
//! and its first letter identifies the network (`N`, `T` or `M`).

use ripemd::Ripemd160;
use sha3::Digest;

use crate::{keccak256, PUBLIC_KEY_LENGTH};

/// Length of the decoded address in bytes.
pub const ADDRESS_DECODED_LENGTH: usize = 25;

/// Length of the encoded address in characters.
pub const ADDRESS_ENCODED_LENGTH: usize = 40;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Derive the address of a public key on the given network.
pub fn to_address(public_key: &[u8; PUBLIC_KEY_LENGTH], network_id: i32) -> String {
    let sha = keccak256(public_key);
    let ripe = Ripemd160::digest(sha);

    let mut decoded = [0u8; ADDRESS_DECODED_LENGTH];
    decoded[0] = network_id as u8;
    decoded[1..21].copy_from_slice(&ripe);

    let checksum = keccak256(&decoded[..21]);
    decoded[21..].copy_from_slice(&checksum[..4]);

    base32_encode(&decoded)
}

/// Derive the address of a hex public key.
pub fn to_address_hex(public_key: &str, network_id: i32) -> Result<String, crate::Error> {
    let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
    hex::decode_to_slice(public_key, &mut bytes).map_err(|_| crate::Error::InvalidPublicKey)?;
    Ok(to_address(&bytes, network_id))
}

/// RFC 4648 base32, upper case, unpadded.
fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}
