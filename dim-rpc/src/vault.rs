//! Key Vault
//!
//! Persistent storage for encrypted private keys and signed transactions.
//!
//! - Encrypted keys are stored under the Keccak-256 of the user id
//! - Signed transactions are stored under their content id
//!
//! The vault never sees a plaintext private key.

use async_trait::async_trait;
use lmdb::{Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::debug;

use crate::{
    error::{GatewayError, Result},
    transaction::TransferTransaction,
};

/// Key prefix for encrypted private keys
const KEY_PREFIX: &str = "key:";

/// Key prefix for signed transaction records
const TX_PREFIX: &str = "tx:";

/// LMDB map size
const MAP_SIZE: usize = 256 * 1024 * 1024;

/// Ordered key-value store backing the vault.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

/// LMDB-backed store in a single file.
pub struct LmdbStore {
    env: Arc<Environment>,
    db: Database,
}

impl LmdbStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Persistence(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let env = Environment::new()
            .set_flags(EnvironmentFlags::NO_SUB_DIR)
            .set_max_dbs(1)
            .set_map_size(MAP_SIZE)
            .open(path)?;

        let db = env.create_db(Some("vault"), DatabaseFlags::empty())?;
        debug!("Opened vault at {}", path.display());

        Ok(Self {
            env: Arc::new(env),
            db,
        })
    }
}

#[async_trait]
impl KvStore for LmdbStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
            let txn = env.begin_ro_txn()?;
            let value = match txn.get(db, &key) {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(lmdb::Error::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            Ok(value)
        })
        .await?
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut txn = env.begin_rw_txn()?;
            txn.put(db, &key, &value, WriteFlags::empty())?;
            txn.commit()?;
            Ok(())
        })
        .await?
    }
}

/// Persisted form of a signed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRecord {
    /// Hex of the canonical serialization
    pub serialized: String,
    /// The unsigned transaction; absent for externally signed payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<TransferTransaction>,
    /// Hex of the 64-byte signature
    pub signature: String,
}

/// Identity-keyed ciphertexts and content-addressed transaction records.
#[derive(Clone)]
pub struct Vault {
    store: Arc<dyn KvStore>,
}

impl Vault {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Open an LMDB vault at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(LmdbStore::open(path)?)))
    }

    /// Storage key for a user id.
    pub fn identity_key(user_id: &str) -> String {
        dim_crypto_nem::keccak256_hex(user_id)
    }

    pub async fn get_ciphertext(&self, user_id: &str) -> Result<Option<String>> {
        let key = format!("{KEY_PREFIX}{}", Self::identity_key(user_id));
        match self.store.get(&key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| GatewayError::Persistence(format!("corrupt key entry: {e}"))),
            None => Ok(None),
        }
    }

    /// Store a ciphertext, replacing any previous entry for the identity.
    pub async fn put_ciphertext(&self, user_id: &str, ciphertext: &str) -> Result<()> {
        let key = format!("{KEY_PREFIX}{}", Self::identity_key(user_id));
        self.store.put(&key, ciphertext.as_bytes().to_vec()).await
    }

    pub async fn get_record(&self, id: &str) -> Result<Option<SignedRecord>> {
        match self.store.get(&format!("{TX_PREFIX}{id}")).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| GatewayError::Persistence(format!("corrupt transaction record: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn put_record(&self, id: &str, record: &SignedRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| GatewayError::Persistence(format!("failed to encode record: {e}")))?;
        self.store.put(&format!("{TX_PREFIX}{id}"), bytes).await
    }
}
