//! Transfer Pipeline
//!
//! Resolve key, prepare, serialize, sign, persist. The signed record is
//! written only after signing succeeds, and only the unsigned transaction is
//! returned to the caller.

use tracing::info;

use crate::{
    error::{GatewayError, Result},
    gateway::Gateway,
    keys::KeySource,
    transaction::TransferTransaction,
    transfer::prepare_transfer,
    vault::SignedRecord,
};

/// A validated request to create a signed transfer.
#[derive(Debug)]
pub struct TransferRequest {
    pub source: KeySource,
    pub recipient: String,
    /// Quantity in the mosaic's smallest unit
    pub amount: u64,
    pub currency: Option<String>,
}

impl TransferRequest {
    pub fn new(
        source: KeySource,
        recipient: Option<String>,
        amount: Option<u64>,
        currency: Option<String>,
    ) -> Result<Self> {
        let recipient = recipient
            .filter(|r| !r.is_empty())
            .ok_or_else(|| GatewayError::Validation("missing recipient".to_string()))?;
        let amount =
            amount.ok_or_else(|| GatewayError::Validation("missing amount".to_string()))?;

        Ok(Self {
            source,
            recipient,
            amount,
            currency: currency.filter(|c| !c.is_empty()),
        })
    }
}

/// Content id of a serialized transaction: Keccak-256 of its hex form.
pub fn transaction_id(serialized_hex: &str) -> String {
    dim_crypto_nem::keccak256_hex(serialized_hex)
}

impl Gateway {
    /// Create, sign and store a transfer on `network`.
    ///
    /// The signing key is resolved before any node is contacted, so a bad
    /// key fails without network I/O.
    pub async fn create_transfer(
        &self,
        network: &str,
        request: &TransferRequest,
    ) -> Result<TransferTransaction> {
        self.connections().registry().select(network)?;
        let keypair = self.keys().resolve(&request.source).await?;
        let conn = self.connect(network).await?;

        let currency = request
            .currency
            .as_deref()
            .unwrap_or(self.default_currency());
        let unsigned = prepare_transfer(
            self.client(),
            &conn,
            &keypair,
            &request.recipient,
            request.amount,
            currency,
        )
        .await?;

        let serialized = unsigned.transaction.serialize()?;
        let signature = keypair.sign(&serialized);
        let serialized_hex = hex::encode(&serialized);
        let id = transaction_id(&serialized_hex);

        let record = SignedRecord {
            serialized: serialized_hex,
            tx: Some(unsigned.transaction.clone()),
            signature: hex::encode(signature),
        };
        self.vault().put_record(&id, &record).await?;

        info!(
            "Signed transfer {} of {} {} to {}",
            id, request.amount, currency, unsigned.transaction.recipient
        );

        Ok(unsigned.transaction)
    }
}
