// Copyright (c) 2024 The Botho Foundation

//! BIP-38 passphrase-protected private keys (non-EC-multiply mode).
//!
//! The checksum salt is derived from the Bitcoin P2PKH address of the same 32
//! key bytes interpreted as a secp256k1 private key. A wrong passphrase is
//! detected by recomputing that address after decryption.
//!
//! Scrypt cost defaults to the BIP-38 values (`N = 2^14, r = 8, p = 8`).
//! Ciphertexts produced with other parameters are only readable with the same
//! parameters.

use aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes256,
};
use k256::ecdsa::SigningKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::Error;

const PREFIX: [u8; 2] = [0x01, 0x42];
const FLAG_COMPRESSED: u8 = 0xe0;
const FLAG_UNCOMPRESSED: u8 = 0xc0;
const PAYLOAD_LENGTH: usize = 39;

/// Scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bip38Params {
    /// log2 of the scrypt `N` parameter
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for Bip38Params {
    fn default() -> Self {
        Self {
            log_n: 14,
            r: 8,
            p: 8,
        }
    }
}

impl Bip38Params {
    fn scrypt_params(&self) -> Result<scrypt::Params, Error> {
        scrypt::Params::new(self.log_n, self.r, self.p, 64)
            .map_err(|e| Error::DerivationError(format!("invalid scrypt parameters: {e}")))
    }
}

/// Encrypt a private key with a passphrase.
///
/// Always produces the compressed-key form (`6PY...`).
pub fn encrypt(
    private_key: &[u8; 32],
    passphrase: &str,
    params: &Bip38Params,
) -> Result<String, Error> {
    let address = p2pkh_address(private_key, true)?;
    let address_hash = address_hash(&address);
    let derived = derive(passphrase, &address_hash, params)?;

    let cipher = Aes256::new(GenericArray::from_slice(&derived[32..]));
    let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
    payload.extend_from_slice(&PREFIX);
    payload.push(FLAG_COMPRESSED);
    payload.extend_from_slice(&address_hash);

    for half in 0..2 {
        let range = half * 16..(half + 1) * 16;
        let mut block = GenericArray::clone_from_slice(&private_key[range.clone()]);
        for (byte, mask) in block.iter_mut().zip(&derived[range]) {
            *byte ^= mask;
        }
        cipher.encrypt_block(&mut block);
        payload.extend_from_slice(&block);
    }

    Ok(bs58::encode(payload).with_check().into_string())
}

/// Decrypt a BIP-38 string with a passphrase.
pub fn decrypt(
    encrypted: &str,
    passphrase: &str,
    params: &Bip38Params,
) -> Result<Zeroizing<[u8; 32]>, Error> {
    let payload = bs58::decode(encrypted.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| Error::InvalidCiphertext(e.to_string()))?;

    if payload.len() != PAYLOAD_LENGTH {
        return Err(Error::InvalidCiphertext(format!(
            "expected {PAYLOAD_LENGTH} bytes, got {}",
            payload.len()
        )));
    }
    if payload[..2] != PREFIX {
        return Err(Error::InvalidCiphertext(
            "EC-multiplied keys are not supported".to_string(),
        ));
    }
    let compressed = match payload[2] {
        FLAG_COMPRESSED => true,
        FLAG_UNCOMPRESSED => false,
        flag => {
            return Err(Error::InvalidCiphertext(format!(
                "unknown flag byte {flag:#04x}"
            )))
        }
    };

    let mut expected_hash = [0u8; 4];
    expected_hash.copy_from_slice(&payload[3..7]);
    let derived = derive(passphrase, &expected_hash, params)?;

    let cipher = Aes256::new(GenericArray::from_slice(&derived[32..]));
    let mut private_key = Zeroizing::new([0u8; 32]);

    for half in 0..2 {
        let range = half * 16..(half + 1) * 16;
        let start = 7 + half * 16;
        let mut block = GenericArray::clone_from_slice(&payload[start..start + 16]);
        cipher.decrypt_block(&mut block);
        for ((out, byte), mask) in private_key[range.clone()]
            .iter_mut()
            .zip(block.iter())
            .zip(&derived[range])
        {
            *out = byte ^ mask;
        }
    }

    // Garbage keys from a wrong passphrase may not even be valid scalars
    let address = p2pkh_address(&private_key, compressed).map_err(|_| Error::WrongPassphrase)?;
    if address_hash(&address) != expected_hash {
        return Err(Error::WrongPassphrase);
    }

    Ok(private_key)
}

fn derive(
    passphrase: &str,
    salt: &[u8; 4],
    params: &Bip38Params,
) -> Result<Zeroizing<[u8; 64]>, Error> {
    let mut derived = Zeroizing::new([0u8; 64]);
    scrypt::scrypt(
        passphrase.as_bytes(),
        salt,
        &params.scrypt_params()?,
        &mut derived[..],
    )
    .map_err(|e| Error::DerivationError(e.to_string()))?;
    Ok(derived)
}

/// Base58check P2PKH address (version 0x00) for a secp256k1 private key.
fn p2pkh_address(private_key: &[u8; 32], compressed: bool) -> Result<String, Error> {
    let signing_key = SigningKey::from_bytes(private_key.into())
        .map_err(|_| Error::InvalidPrivateKey("not a valid secp256k1 scalar".to_string()))?;
    let point = signing_key.verifying_key().to_encoded_point(compressed);

    let hash160 = Ripemd160::digest(Sha256::digest(point.as_bytes()));
    let mut versioned = Vec::with_capacity(21);
    versioned.push(0x00);
    versioned.extend_from_slice(&hash160);

    Ok(bs58::encode(versioned).with_check().into_string())
}

fn address_hash(address: &str) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(address.as_bytes()));
    let mut hash = [0u8; 4];
    hash.copy_from_slice(&digest[..4]);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> Bip38Params {
        Bip38Params {
            log_n: 4,
            r: 8,
            p: 1,
        }
    }

    #[test]
    fn test_reference_vector_compressed() {
        // BIP-38 "compression, no EC multiply" test vector 1
        let key = hex::decode("cbf4b9f70470856bb4f40f80b87edb90865997ffee6df315ab166d713af433a5")
            .unwrap();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);

        let params = Bip38Params::default();
        let encrypted = encrypt(&bytes, "TestingOneTwoThree", &params).unwrap();
        assert_eq!(
            encrypted,
            "6PYNKZ1EAgYgmQfmNVamxyXVWHzK5s6DGhwP4J5o44cvXdoY7sRzhtpUeo"
        );

        let decrypted = decrypt(&encrypted, "TestingOneTwoThree", &params).unwrap();
        assert_eq!(*decrypted, bytes);
    }

    #[test]
    fn test_round_trip_with_light_params() {
        let key: [u8; 32] = [0x42; 32];
        let encrypted = encrypt(&key, "correct horse", &light()).unwrap();
        assert!(encrypted.starts_with("6P"));

        let decrypted = decrypt(&encrypted, "correct horse", &light()).unwrap();
        assert_eq!(*decrypted, key);
    }

    #[test]
    fn test_wrong_passphrase() {
        let key: [u8; 32] = [0x42; 32];
        let encrypted = encrypt(&key, "correct horse", &light()).unwrap();

        assert!(matches!(
            decrypt(&encrypted, "battery staple", &light()),
            Err(Error::WrongPassphrase)
        ));
    }

    #[test]
    fn test_corrupted_ciphertext() {
        assert!(matches!(
            decrypt("6PYnotbase58check", "pass", &light()),
            Err(Error::InvalidCiphertext(_))
        ));

        let short = bs58::encode([0x01, 0x42, 0xe0]).with_check().into_string();
        assert!(matches!(
            decrypt(&short, "pass", &light()),
            Err(Error::InvalidCiphertext(_))
        ));
    }
}
