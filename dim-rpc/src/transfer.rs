//! Transfer Preparation
//!
//! Builds an unsigned mosaic transfer from the node's view of the mosaic:
//! the definition (for divisibility) and the current supply (for the fee).

use dim_crypto_nem::KeyPair;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{GatewayError, Result},
    network::{network_id_from_address, Connection},
    node_client::NodeClient,
    transaction::{
        due_minutes, nem_timestamp, total_fee, version_for, Message, Mosaic, MosaicDefinition,
        MosaicDefinitionMetaDataPair, MosaicId, TransferTransaction, TRANSFER_TYPE,
        XEM_DIVISIBILITY_FACTOR,
    },
};

/// Mosaic sent when a request names no currency
pub const DEFAULT_CURRENCY: &str = "dim:coin";

#[derive(Debug, Deserialize)]
struct DefinitionPage {
    #[serde(default)]
    data: Vec<DefinitionEntry>,
}

#[derive(Debug, Deserialize)]
struct DefinitionEntry {
    mosaic: MosaicDefinition,
}

#[derive(Debug, Deserialize)]
struct MosaicSupply {
    supply: u64,
}

/// An unsigned transfer and the mosaic data its fee was computed from.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    pub transaction: TransferTransaction,
    pub metadata: Vec<MosaicDefinitionMetaDataPair>,
}

/// Canonical recipient form: upper case, no dashes.
pub fn normalize_recipient(recipient: &str) -> String {
    recipient.replace('-', "").to_uppercase()
}

/// Look up a mosaic definition and its supply on the connected node.
pub async fn fetch_mosaic_metadata(
    client: &NodeClient,
    conn: &Connection,
    mosaic_id: &MosaicId,
) -> Result<MosaicDefinitionMetaDataPair> {
    let page: DefinitionPage = client
        .read_json(
            conn,
            &format!(
                "/namespace/mosaic/definition/page?namespace={}",
                mosaic_id.namespace_id
            ),
        )
        .await?;

    let definition = page
        .data
        .into_iter()
        .map(|entry| entry.mosaic)
        .find(|definition| definition.id == *mosaic_id)
        .ok_or_else(|| GatewayError::DefinitionNotFound(mosaic_id.to_string()))?;

    let supply: MosaicSupply = client
        .read_json(conn, &format!("/mosaic/supply?mosaicId={mosaic_id}"))
        .await?;

    debug!(
        "Mosaic {} divisibility {} supply {}",
        mosaic_id,
        definition.divisibility(),
        supply.supply
    );

    Ok(MosaicDefinitionMetaDataPair {
        mosaic_definition: definition,
        supply: supply.supply,
    })
}

/// Assemble the transfer for a single mosaic attachment.
///
/// The XEM amount is fixed at one whole XEM, which also serves as the
/// mosaic quantity multiplier. The network is taken from the recipient.
pub fn assemble_transfer(
    signer: &str,
    recipient: &str,
    amount: u64,
    metadata: &MosaicDefinitionMetaDataPair,
    unix_seconds: i64,
) -> TransferTransaction {
    let recipient = normalize_recipient(recipient);
    let network_id = network_id_from_address(&recipient);
    let time_stamp = nem_timestamp(unix_seconds);

    let message = Message::empty();
    let mosaics = vec![Mosaic {
        mosaic_id: metadata.mosaic_definition.id.clone(),
        quantity: amount,
    }];
    let fee = total_fee(
        XEM_DIVISIBILITY_FACTOR,
        &message,
        &mosaics,
        std::slice::from_ref(metadata),
    );

    TransferTransaction {
        kind: TRANSFER_TYPE,
        version: version_for(network_id),
        signer: signer.to_string(),
        time_stamp,
        deadline: time_stamp + due_minutes(network_id) * 60,
        recipient,
        amount: XEM_DIVISIBILITY_FACTOR,
        fee,
        message,
        mosaics,
    }
}

/// Prepare an unsigned transfer of `amount` units of `currency`.
///
/// Any node failure aborts the preparation; nothing partial is returned.
pub async fn prepare_transfer(
    client: &NodeClient,
    conn: &Connection,
    keypair: &KeyPair,
    recipient: &str,
    amount: u64,
    currency: &str,
) -> Result<UnsignedTransfer> {
    let mosaic_id = MosaicId::parse(currency)?;
    let metadata = fetch_mosaic_metadata(client, conn, &mosaic_id).await?;

    let transaction = assemble_transfer(
        &keypair.public_key_hex(),
        recipient,
        amount,
        &metadata,
        chrono::Utc::now().timestamp(),
    );

    Ok(UnsignedTransfer {
        transaction,
        metadata: vec![metadata],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MAINNET_ID, TESTNET_ID};
    use crate::transaction::{MosaicProperty, NEM_EPOCH};

    fn dim_coin(supply: u64) -> MosaicDefinitionMetaDataPair {
        MosaicDefinitionMetaDataPair {
            mosaic_definition: MosaicDefinition {
                creator: String::new(),
                id: MosaicId::new("dim", "coin"),
                description: String::new(),
                properties: vec![MosaicProperty {
                    name: "divisibility".to_string(),
                    value: "6".to_string(),
                }],
                levy: serde_json::Value::Null,
            },
            supply,
        }
    }

    const SIGNER: &str = "5645ea5b6bfc9bce6e69eab6002281d0e9c52fc0405ab99533d28e497b96ed81";

    #[test]
    fn test_normalize_recipient() {
        assert_eq!(
            normalize_recipient("na3sh7-qutg6o-s4eghs"),
            "NA3SH7QUTG6OS4EGHS"
        );
    }

    #[test]
    fn test_assemble_mainnet() {
        let tx = assemble_transfer(
            SIGNER,
            "NA3SH7-QUTG6O-S4EGHS-ES4265-52FAJY-ZR2NRC-QQGW",
            1_000_000_000,
            &dim_coin(9_000_000),
            NEM_EPOCH + 1000,
        );

        assert_eq!(tx.kind, TRANSFER_TYPE);
        assert_eq!(tx.version, version_for(MAINNET_ID));
        assert_eq!(tx.recipient, "NA3SH7QUTG6OS4EGHSES426552FAJYZR2NRCQQGW");
        assert_eq!(tx.amount, 1_000_000);
        assert_eq!(tx.time_stamp, 1000);
        assert_eq!(tx.deadline, 1000 + 24 * 60 * 60);
        assert_eq!(tx.message, Message::empty());
        assert_eq!(tx.mosaics.len(), 1);
        assert_eq!(tx.mosaics[0].mosaic_id, MosaicId::new("dim", "coin"));
        assert_eq!(tx.mosaics[0].quantity, 1_000_000_000);
        assert_eq!(tx.signer, SIGNER);
    }

    #[test]
    fn test_assemble_testnet_deadline() {
        let tx = assemble_transfer(
            SIGNER,
            "TD23FHYZQPYUEIZ67VN5LHLGYGABGSGZLL7VVX44",
            1,
            &dim_coin(9_000_000),
            NEM_EPOCH + 10,
        );
        assert_eq!(tx.version, version_for(TESTNET_ID));
        assert_eq!(tx.deadline, 10 + 60 * 60);
    }

    #[test]
    fn test_assembled_fee_matches_schedule() {
        let metadata = dim_coin(9_000_000);
        let tx = assemble_transfer(SIGNER, "NA3SH7", 1_000_000, &metadata, NEM_EPOCH);
        assert_eq!(
            tx.fee,
            total_fee(
                XEM_DIVISIBILITY_FACTOR,
                &tx.message,
                &tx.mosaics,
                &[metadata]
            )
        );
        assert!(tx.serialize().is_ok());
    }

    #[test]
    fn test_definition_page_shape() {
        let page: DefinitionPage = serde_json::from_str(
            r#"{"data": [{
                "meta": {"id": 26},
                "mosaic": {
                    "creator": "10cfe522fe23c015b8ab24ef6a0c32c5de78eb55b2152ed07b6a092121187100",
                    "description": "DIM COIN",
                    "id": {"namespaceId": "dim", "name": "coin"},
                    "properties": [
                        {"name": "divisibility", "value": "6"},
                        {"name": "initialSupply", "value": "9000000000"}
                    ],
                    "levy": {}
                }
            }]}"#,
        )
        .unwrap();

        let definition = &page.data[0].mosaic;
        assert_eq!(definition.id, MosaicId::new("dim", "coin"));
        assert_eq!(definition.divisibility(), 6);
    }
}
