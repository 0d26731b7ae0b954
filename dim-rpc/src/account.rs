//! Account operations: wallet creation and pass-through account reads.

use dim_crypto_nem::{address::to_address, KeyPair};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::{
    error::Result,
    gateway::Gateway,
    keys::{BrainScheme, KeyScheme, RawKeyScheme},
};

/// Public view of a key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub public_key: String,
    pub address: String,
}

impl AccountInfo {
    pub fn new(keypair: &KeyPair, network_id: i32) -> Self {
        Self {
            public_key: keypair.public_key_hex(),
            address: to_address(keypair.public_key(), network_id),
        }
    }
}

/// A vault-backed wallet and its stored ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultWallet {
    pub public_key: String,
    pub address: String,
    pub wif: String,
}

impl Gateway {
    /// Account state as reported by the node.
    pub async fn get_account(&self, network: &str, address: &str) -> Result<Value> {
        let conn = self.connect(network).await?;
        let query = address_query(address).finish();
        self.client()
            .read_json(&conn, &format!("/account/get?{query}"))
            .await
    }

    /// Transfer history as reported by the node, optionally paged from `id`.
    pub async fn get_transfers(
        &self,
        network: &str,
        address: &str,
        id: Option<u64>,
    ) -> Result<Value> {
        let conn = self.connect(network).await?;
        let path = {
            let mut query = address_query(address);
            if let Some(id) = id.filter(|id| *id > 0) {
                query.append_pair("id", &id.to_string());
            }
            format!("/account/transfers/all?{}", query.finish())
        };
        self.client().read_json(&conn, &path).await
    }

    /// Open the user's vault wallet, creating it on first use.
    pub async fn create_vault_wallet(
        &self,
        network: &str,
        user_id: &str,
        passphrase: &str,
    ) -> Result<VaultWallet> {
        let network = self.connections().registry().select(network)?;
        let (keypair, wif) = self.keys().get_or_generate(user_id, passphrase).await?;
        let account = AccountInfo::new(&keypair, network.id);

        Ok(VaultWallet {
            public_key: account.public_key,
            address: account.address,
            wif,
        })
    }

    pub async fn create_private_key_wallet(
        &self,
        network: &str,
        private_key: &str,
    ) -> Result<AccountInfo> {
        let network = self.connections().registry().select(network)?;
        let keypair = RawKeyScheme.derive(private_key)?;
        Ok(AccountInfo::new(&keypair, network.id))
    }

    pub async fn create_brain_wallet(
        &self,
        network: &str,
        passphrase: &str,
    ) -> Result<AccountInfo> {
        let network = self.connections().registry().select(network)?;
        let keypair = BrainScheme.derive(passphrase)?;
        Ok(AccountInfo::new(&keypair, network.id))
    }

    /// The stored ciphertext for a user.
    pub async fn get_vault_account(&self, user_id: &str) -> Result<String> {
        self.keys().stored_ciphertext(user_id).await
    }
}

fn address_query(address: &str) -> form_urlencoded::Serializer<'static, String> {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("address", address);
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MAINNET_ID, TESTNET_ID};

    #[test]
    fn test_account_info() {
        let keypair = BrainScheme.derive("this is a test").unwrap();

        let mainnet = AccountInfo::new(&keypair, MAINNET_ID);
        assert_eq!(mainnet.address, "ND23FHYZQPYUEIZ67VN5LHLGYGABGSGZLIYC76BH");

        let testnet = AccountInfo::new(&keypair, TESTNET_ID);
        assert_eq!(testnet.address, "TD23FHYZQPYUEIZ67VN5LHLGYGABGSGZLL7VVX44");
        assert_eq!(testnet.public_key, mainnet.public_key);
    }

    #[test]
    fn test_address_query_is_escaped() {
        assert_eq!(address_query("TABC").finish(), "address=TABC");
        assert_eq!(address_query("a&id=1").finish(), "address=a%26id%3D1");
    }

    #[test]
    fn test_wire_names() {
        let wallet = VaultWallet {
            public_key: "pk".into(),
            address: "TA".into(),
            wif: "6P".into(),
        };
        let json = serde_json::to_value(&wallet).unwrap();
        assert_eq!(json["publicKey"], "pk");
        assert_eq!(json["wif"], "6P");
    }
}
