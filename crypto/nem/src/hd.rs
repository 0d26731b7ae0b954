// Copyright (c) 2024 The Botho Foundation

//! BIP-39 mnemonics and BIP-32 master node derivation.
//!
//! Fresh vault wallets come from a random 12-word English mnemonic. The
//! account private key is the master node key of the BIP-39 seed; no child
//! path is derived.

use bip39::{Language, Mnemonic, MnemonicType, Seed};
use hmac::{Hmac, Mac};
use k256::SecretKey;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::Error;

type HmacSha512 = Hmac<Sha512>;

/// BIP-32 master node.
pub struct MasterKey {
    pub private_key: Zeroizing<[u8; 32]>,
    pub chain_code: [u8; 32],
}

/// Generate a random 12-word English mnemonic from the OS CSPRNG.
pub fn generate_mnemonic() -> Mnemonic {
    Mnemonic::new(MnemonicType::Words12, Language::English)
}

/// Parse an English mnemonic phrase.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, Error> {
    Mnemonic::from_phrase(phrase, Language::English).map_err(|_| Error::InvalidMnemonic)
}

/// Derive the BIP-32 master node from a seed.
pub fn master_key_from_seed(seed: &[u8]) -> Result<MasterKey, Error> {
    let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
        .map_err(|e| Error::DerivationError(e.to_string()))?;
    mac.update(seed);
    let mut result = Zeroizing::new([0u8; 64]);
    result.copy_from_slice(&mac.finalize().into_bytes());

    let mut private_key = Zeroizing::new([0u8; 32]);
    let mut chain_code = [0u8; 32];
    private_key.copy_from_slice(&result[..32]);
    chain_code.copy_from_slice(&result[32..]);

    // IL must be a valid secp256k1 scalar (non-zero, below the group order)
    SecretKey::from_bytes((&*private_key).into())
        .map_err(|_| Error::DerivationError("master key out of range".to_string()))?;

    Ok(MasterKey {
        private_key,
        chain_code,
    })
}

/// Derive the master private key for a mnemonic and BIP-39 passphrase.
pub fn master_private_key(
    mnemonic: &Mnemonic,
    passphrase: &str,
) -> Result<Zeroizing<[u8; 32]>, Error> {
    let seed = Seed::new(mnemonic, passphrase);
    Ok(master_key_from_seed(seed.as_bytes())?.private_key)
}

/// Generate a fresh private key from a throwaway mnemonic.
///
/// The mnemonic is dropped before returning; only the key survives.
pub fn generate_private_key(passphrase: &str) -> Result<Zeroizing<[u8; 32]>, Error> {
    let mnemonic = generate_mnemonic();
    master_private_key(&mnemonic, passphrase)
}
