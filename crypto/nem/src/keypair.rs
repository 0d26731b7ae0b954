// Copyright (c) 2024 The Botho Foundation

//! Ed25519 key pairs hashed with Keccak-512.
//!
//! NEM uses the Ed25519 curve but replaces SHA-512 with Keccak-512 and feeds
//! the private key to the hash in reversed byte order. Signatures are
//! deterministic.

use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use sha3::{Digest, Keccak512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::Error;

/// Length of a private key in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Length of a public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of a signature (`R || S`) in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// An account key pair.
///
/// The public key is derived on construction; nothing else is cached.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    secret: [u8; SECRET_KEY_LENGTH],
    #[zeroize(skip)]
    public: [u8; PUBLIC_KEY_LENGTH],
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "KeyPair {{ public_key: {} }}", self.public_key_hex())
    }
}

impl KeyPair {
    /// Create a key pair from raw private key bytes.
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let expanded = expand(secret);
        let public = EdwardsPoint::mul_base(&expanded.scalar).compress().to_bytes();

        Self {
            secret: *secret,
            public,
        }
    }

    /// Create a key pair from a hex private key.
    ///
    /// Accepts 64 hex characters, or 66 with a leading `00`.
    pub fn from_hex(private_key: &str) -> Result<Self, Error> {
        let trimmed = private_key.trim();
        let trimmed = match trimmed.len() {
            64 => trimmed,
            66 if trimmed.starts_with("00") => &trimmed[2..],
            n => {
                return Err(Error::InvalidPrivateKey(format!(
                    "expected 64 hex characters, got {n}"
                )))
            }
        };

        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        hex::decode_to_slice(trimmed, &mut bytes[..])
            .map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_bytes(&bytes))
    }

    /// The raw private key bytes.
    pub fn secret_bytes(&self) -> &[u8; SECRET_KEY_LENGTH] {
        &self.secret
    }

    /// The private key as lowercase hex.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret))
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public)
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let expanded = expand(&self.secret);

        let mut hasher = Keccak512::new();
        hasher.update(&expanded.prefix[..]);
        hasher.update(message);
        let mut nonce_hash = Zeroizing::new([0u8; 64]);
        nonce_hash.copy_from_slice(&hasher.finalize());
        let nonce = Scalar::from_bytes_mod_order_wide(&nonce_hash);

        let r = EdwardsPoint::mul_base(&nonce).compress();
        let h = challenge(r.as_bytes(), &self.public, message);
        let s = nonce + h * expanded.scalar;

        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature[..32].copy_from_slice(r.as_bytes());
        signature[32..].copy_from_slice(s.as_bytes());
        signature
    }
}

/// Verify a signature against a public key.
pub fn verify(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    message: &[u8],
    signature: &[u8; SIGNATURE_LENGTH],
) -> bool {
    let Some(a) = CompressedEdwardsY(*public_key).decompress() else {
        return false;
    };

    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);

    // Reject non-canonical S to rule out malleated signatures
    let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
        return false;
    };

    let h = challenge(&r_bytes, public_key, message);
    let expected_r = EdwardsPoint::vartime_double_scalar_mul_basepoint(&-h, &a, &s);

    expected_r.compress().to_bytes() == r_bytes
}

struct ExpandedSecret {
    scalar: Scalar,
    prefix: Zeroizing<[u8; 32]>,
}

impl Drop for ExpandedSecret {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

/// Hash the byte-reversed private key and clamp the lower half.
fn expand(secret: &[u8; SECRET_KEY_LENGTH]) -> ExpandedSecret {
    let mut reversed = Zeroizing::new(*secret);
    reversed.reverse();

    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&Keccak512::digest(&reversed[..]));

    let mut lower = Zeroizing::new([0u8; 32]);
    lower.copy_from_slice(&digest[..32]);
    lower[0] &= 248;
    lower[31] &= 127;
    lower[31] |= 64;

    let mut prefix = Zeroizing::new([0u8; 32]);
    prefix.copy_from_slice(&digest[32..]);

    ExpandedSecret {
        scalar: Scalar::from_bytes_mod_order(*lower),
        prefix,
    }
}

fn challenge(r: &[u8; 32], public_key: &[u8; PUBLIC_KEY_LENGTH], message: &[u8]) -> Scalar {
    let mut hasher = Keccak512::new();
    hasher.update(r);
    hasher.update(public_key);
    hasher.update(message);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}
