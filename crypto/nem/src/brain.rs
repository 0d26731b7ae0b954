// Copyright (c) 2024 The Botho Foundation

//! Passphrase-derived private keys.
//!
//! The private key is the result of hashing the passphrase with Keccak-256
//! [`BRAIN_ITERATIONS`] times. There is no salt, so the same passphrase yields
//! the same account on every network. This is only as strong as the
//! passphrase.

use zeroize::Zeroizing;

use crate::{keccak256, KeyPair};

/// Number of Keccak-256 applications, counting the first hash of the
/// passphrase itself.
pub const BRAIN_ITERATIONS: usize = 6000;

/// Derive the raw private key for a passphrase.
pub fn derive_private_key(passphrase: &str) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new(keccak256(passphrase.as_bytes()));
    for _ in 1..BRAIN_ITERATIONS {
        *key = keccak256(&key[..]);
    }
    key
}

/// Derive the key pair for a passphrase.
pub fn derive_keypair(passphrase: &str) -> KeyPair {
    KeyPair::from_bytes(&derive_private_key(passphrase))
}
