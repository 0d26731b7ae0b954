//! Key Derivation
//!
//! Resolves the signing key for a request from one of three sources:
//!
//! - **Vault-backed**: an HD-generated key, BIP-38 encrypted with
//!   `passphrase + user_id` and stored under the user's identity
//! - **Direct**: a hex private key supplied with the request
//! - **Brain**: a key derived from a passphrase alone
//!
//! Plaintext keys exist only for the duration of one request. The public key
//! is re-derived from the decrypted private key on every vault read.

use dim_crypto_nem::{bip38, bip38::Bip38Params, brain, hd, KeyPair};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{
    error::{GatewayError, Result},
    vault::Vault,
};

/// A way of turning caller-supplied secret material into a key pair.
pub trait KeyScheme {
    fn derive(&self, secret: &str) -> Result<KeyPair>;

    /// Protect a private key for storage.
    fn encrypt(&self, keypair: &KeyPair, secret: &str, params: &Bip38Params) -> Result<String> {
        Ok(bip38::encrypt(keypair.secret_bytes(), secret, params)?)
    }
}

/// Fresh key from a random 12-word mnemonic; `secret` is the BIP-39
/// passphrase. Every call yields a new key.
pub struct HdScheme;

impl KeyScheme for HdScheme {
    fn derive(&self, secret: &str) -> Result<KeyPair> {
        let private_key = hd::generate_private_key(secret)?;
        Ok(KeyPair::from_bytes(&private_key))
    }
}

/// Caller-supplied hex private key.
pub struct RawKeyScheme;

impl KeyScheme for RawKeyScheme {
    fn derive(&self, secret: &str) -> Result<KeyPair> {
        Ok(KeyPair::from_hex(secret)?)
    }
}

/// Passphrase hashed [`brain::BRAIN_ITERATIONS`] times.
///
/// Unsalted and only as strong as the passphrase. The iteration count is
/// part of the derivation and cannot change without changing every account.
pub struct BrainScheme;

impl KeyScheme for BrainScheme {
    fn derive(&self, secret: &str) -> Result<KeyPair> {
        Ok(brain::derive_keypair(secret))
    }
}

/// Where a request's signing key comes from.
///
/// Built once from request parameters; each variant carries exactly the
/// fields it needs.
pub enum KeySource {
    VaultBacked {
        user_id: String,
        passphrase: Zeroizing<String>,
    },
    DirectKey {
        private_key: Zeroizing<String>,
    },
    BrainDerived {
        passphrase: Zeroizing<String>,
    },
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::VaultBacked { user_id, .. } => {
                write!(f, "VaultBacked {{ user_id: {user_id} }}")
            }
            KeySource::DirectKey { .. } => write!(f, "DirectKey"),
            KeySource::BrainDerived { .. } => write!(f, "BrainDerived"),
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::Validation(format!("missing {name}"))),
    }
}

impl KeySource {
    pub fn vault_backed(user_id: Option<String>, passphrase: Option<String>) -> Result<Self> {
        Ok(KeySource::VaultBacked {
            user_id: required(user_id, "userid")?,
            passphrase: Zeroizing::new(required(passphrase, "bip38")?),
        })
    }

    pub fn direct_key(private_key: Option<String>) -> Result<Self> {
        Ok(KeySource::DirectKey {
            private_key: Zeroizing::new(required(private_key, "privateKey")?),
        })
    }

    pub fn brain_derived(passphrase: Option<String>) -> Result<Self> {
        Ok(KeySource::BrainDerived {
            passphrase: Zeroizing::new(required(passphrase, "passphrase")?),
        })
    }
}

/// The decryption secret for a vault entry.
fn vault_secret(user_id: &str, passphrase: &str) -> Zeroizing<String> {
    Zeroizing::new(format!("{passphrase}{user_id}"))
}

/// Vault-backed key retrieval and provisioning.
#[derive(Clone)]
pub struct KeyManager {
    vault: Vault,
    params: Bip38Params,
}

impl KeyManager {
    pub fn new(vault: Vault, params: Bip38Params) -> Self {
        Self { vault, params }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Decrypt the stored key for `user_id`.
    ///
    /// Fails with `NotFound` when the identity has no entry, and with a
    /// crypto error when `passphrase` does not open it.
    pub async fn get_keys(&self, user_id: &str, passphrase: &str) -> Result<KeyPair> {
        let ciphertext = self.stored_ciphertext(user_id).await?;
        let secret = vault_secret(user_id, passphrase);
        let params = self.params;

        // scrypt is slow enough to stall the runtime
        let private_key = tokio::task::spawn_blocking(move || {
            bip38::decrypt(&ciphertext, &secret, &params)
        })
        .await
        .map_err(|e| dim_crypto_nem::Error::DerivationError(e.to_string()))??;

        Ok(KeyPair::from_bytes(&private_key))
    }

    /// Generate a new HD key, encrypt it and store it for `user_id`.
    ///
    /// Overwrites any existing entry. Returns the key pair and ciphertext.
    pub async fn generate_and_store(
        &self,
        user_id: &str,
        passphrase: &str,
    ) -> Result<(KeyPair, String)> {
        let secret = vault_secret(user_id, passphrase);
        let bip39_passphrase = Zeroizing::new(passphrase.to_string());
        let params = self.params;

        let (keypair, ciphertext) = tokio::task::spawn_blocking(move || -> Result<_> {
            let scheme = HdScheme;
            let keypair = scheme.derive(&bip39_passphrase)?;
            let ciphertext = scheme.encrypt(&keypair, &secret, &params)?;
            Ok((keypair, ciphertext))
        })
        .await
        .map_err(|e| dim_crypto_nem::Error::DerivationError(e.to_string()))??;

        self.vault.put_ciphertext(user_id, &ciphertext).await?;
        info!("Stored new key for identity {}", Vault::identity_key(user_id));

        Ok((keypair, ciphertext))
    }

    /// [`Self::get_keys`], provisioning a new key when the identity is unknown.
    pub async fn get_or_generate(
        &self,
        user_id: &str,
        passphrase: &str,
    ) -> Result<(KeyPair, String)> {
        match self.get_keys(user_id, passphrase).await {
            Ok(keypair) => {
                let ciphertext = self.stored_ciphertext(user_id).await?;
                Ok((keypair, ciphertext))
            }
            Err(e) if e.is_not_found() => {
                debug!("No key for identity, generating one");
                self.generate_and_store(user_id, passphrase).await
            }
            Err(e) => Err(e),
        }
    }

    /// The stored BIP-38 string for `user_id`.
    pub async fn stored_ciphertext(&self, user_id: &str) -> Result<String> {
        self.vault
            .get_ciphertext(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Private Key".to_string()))
    }

    /// Resolve the key pair for a request.
    pub async fn resolve(&self, source: &KeySource) -> Result<KeyPair> {
        match source {
            KeySource::VaultBacked {
                user_id,
                passphrase,
            } => Ok(self.get_or_generate(user_id, passphrase).await?.0),
            KeySource::DirectKey { private_key } => RawKeyScheme.derive(private_key),
            KeySource::BrainDerived { passphrase } => BrainScheme.derive(passphrase),
        }
    }
}
