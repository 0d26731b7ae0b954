use anyhow::{Context, Result};
use dim_crypto_nem::bip38::Bip38Params;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::transfer::DEFAULT_CURRENCY;

/// Gateway configuration, read from an optional TOML file.
///
/// Every section and field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub node: NodeConfig,
    /// Static peer overrides keyed by network name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve every remote host. Insecure outside a private network.
    #[serde(default)]
    pub allow_remote: bool,

    /// Hosts allowed in addition to loopback; `*` matches one segment
    #[serde(default)]
    pub allow: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allow_remote: false,
            allow: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Vault file; defaults to `~/.dim-rpc/vault.mdb`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,

    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: None,
            scrypt_log_n: default_scrypt_log_n(),
            scrypt_r: default_scrypt_r(),
            scrypt_p: default_scrypt_p(),
        }
    }
}

fn default_scrypt_log_n() -> u8 {
    14
}

fn default_scrypt_r() -> u32 {
    8
}

fn default_scrypt_p() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_currency: default_currency(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub peers: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load `path` if given, else the default file when it exists.
    ///
    /// An explicitly named file must exist; a missing default file yields
    /// the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn bip38_params(&self) -> Bip38Params {
        Bip38Params {
            log_n: self.vault.scrypt_log_n,
            r: self.vault.scrypt_r,
            p: self.vault.scrypt_p,
        }
    }

    pub fn vault_path(&self) -> PathBuf {
        self.vault
            .path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("vault.mdb"))
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node.timeout_secs)
    }

    pub fn peer_overrides(&self) -> BTreeMap<String, Vec<String>> {
        self.networks
            .iter()
            .map(|(name, network)| (name.clone(), network.peers.clone()))
            .collect()
    }
}

/// Get the default data directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dim-rpc")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
