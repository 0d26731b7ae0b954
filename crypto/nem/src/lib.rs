// Copyright (c) 2024 The Botho Foundation

#![deny(unsafe_code)]

//! NEM key material for the DIM gateway.
//!
//! This crate provides everything the gateway needs to hold, derive and
//! protect NEM account keys:
//!
//! - [`KeyPair`]: ed25519 over Keccak-512, the NEM signature scheme
//! - [`address`]: base32 account addresses for each network id
//! - [`brain`]: passphrase-derived ("brain wallet") private keys
//! - [`hd`]: BIP-39 mnemonics and BIP-32 master key derivation
//! - [`bip38`]: passphrase encryption of private keys for storage
//!
//! # Examples
//!
//! ```
//! use dim_crypto_nem::{address::to_address, KeyPair};
//!
//! let keypair = KeyPair::from_hex(
//!     "dd19f3f3178c0867771eed180310a484e1b76527f7a271e3c8b5264e4a5aa414",
//! ).unwrap();
//! let address = to_address(keypair.public_key(), 104);
//! assert!(address.starts_with('N'));
//! ```

pub mod address;
pub mod bip38;
pub mod brain;
pub mod hd;
mod keypair;

pub use keypair::{verify, KeyPair, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};

use sha3::{Digest, Keccak256};

/// Errors that can occur during key operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid mnemonic phrase")]
    InvalidMnemonic,

    #[error("Key derivation failed: {0}")]
    DerivationError(String),

    #[error("Invalid encrypted key: {0}")]
    InvalidCiphertext(String),

    #[error("Decryption failed - wrong passphrase?")]
    WrongPassphrase,
}

/// Keccak-256 digest of arbitrary bytes.
///
/// This is the pre-standard Keccak padding (not FIPS-202 SHA3-256), which is
/// what the NEM protocol calls "SHA3".
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Lowercase hex Keccak-256 of a UTF-8 string.
///
/// Used to derive storage keys for user ids and signed transactions.
pub fn keccak256_hex(text: &str) -> String {
    hex::encode(keccak256(text.as_bytes()))
}
