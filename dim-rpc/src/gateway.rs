//! Gateway state shared by every request.
//!
//! Operations are split across modules by concern:
//!
//! - [`crate::account`]: wallet creation and account reads
//! - [`crate::pipeline`]: signed transfer creation
//! - [`crate::broadcast`]: announcing signed transfers

use dim_crypto_nem::bip38::Bip38Params;
use std::sync::Arc;

use crate::{
    discovery::Connections,
    error::Result,
    keys::KeyManager,
    network::{Connection, NetworkRegistry},
    node_client::NodeClient,
    transfer::DEFAULT_CURRENCY,
    vault::Vault,
};

pub struct Gateway {
    connections: Connections,
    client: NodeClient,
    keys: KeyManager,
    default_currency: String,
}

impl Gateway {
    pub fn new(
        registry: NetworkRegistry,
        client: NodeClient,
        vault: Vault,
        params: Bip38Params,
    ) -> Self {
        Self {
            connections: Connections::new(registry, client.clone()),
            client,
            keys: KeyManager::new(vault, params),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Mosaic used when a transfer names no currency.
    pub fn with_default_currency(mut self, currency: &str) -> Self {
        self.default_currency = currency.to_string();
        self
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn vault(&self) -> &Vault {
        self.keys.vault()
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    /// Connection for `network`, connecting on first use.
    pub async fn connect(&self, network: &str) -> Result<Arc<Connection>> {
        self.connections.connect(network).await
    }
}
