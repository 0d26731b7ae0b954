//! Transfer Transactions
//!
//! The NEM transfer transaction (version 2, with mosaic attachments), its
//! canonical binary serialization and the mosaic fee schedule.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GatewayError, Result};
use crate::network::TESTNET_ID;

/// Transfer transaction type
pub const TRANSFER_TYPE: u32 = 257;

/// Transfer version carrying mosaics
pub const TRANSFER_VERSION: i32 = 2;

/// Unix time of the ledger's genesis block, in seconds
pub const NEM_EPOCH: i64 = 1_427_587_585;

/// Micro-units per XEM
pub const XEM_DIVISIBILITY_FACTOR: u64 = 1_000_000;

/// Plain (unencrypted) message type
pub const PLAIN_MESSAGE: u32 = 1;

/// Fee factor applied to the fee schedule
const FEE_FACTOR: f64 = 0.05;

/// Largest possible mosaic quantity in smallest units
const MAX_MOSAIC_QUANTITY: f64 = 9_000_000_000_000_000.0;

/// Total XEM supply (minus one) used for XEM-equivalent valuation
const XEM_SUPPLY: f64 = 8_999_999_999.0;

/// Fully qualified mosaic id, `namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosaicId {
    pub namespace_id: String,
    pub name: String,
}

impl MosaicId {
    pub fn new(namespace_id: &str, name: &str) -> Self {
        Self {
            namespace_id: namespace_id.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse `namespace:name`. The namespace may itself contain dots.
    pub fn parse(currency: &str) -> Result<Self> {
        match currency.split_once(':') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(GatewayError::Validation(format!(
                "currency must be namespace:name, got {currency:?}"
            ))),
        }
    }
}

impl fmt::Display for MosaicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_id, self.name)
    }
}

/// A quantity of one mosaic attached to a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mosaic {
    pub mosaic_id: MosaicId,
    /// Quantity in the mosaic's smallest unit
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: u32,
    /// Hex payload
    pub payload: String,
}

impl Message {
    pub fn empty() -> Self {
        Self {
            kind: PLAIN_MESSAGE,
            payload: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicProperty {
    pub name: String,
    pub value: String,
}

/// Mosaic definition as returned by the definition page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicDefinition {
    #[serde(default)]
    pub creator: String,
    pub id: MosaicId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: Vec<MosaicProperty>,
    #[serde(default)]
    pub levy: serde_json::Value,
}

impl MosaicDefinition {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Decimal places of the mosaic; 0 when absent or unparseable.
    pub fn divisibility(&self) -> u32 {
        self.property("divisibility")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// A definition together with the mosaic's current supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosaicDefinitionMetaDataPair {
    pub mosaic_definition: MosaicDefinition,
    pub supply: u64,
}

/// Unsigned transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransaction {
    #[serde(rename = "type")]
    pub kind: u32,
    pub version: i32,
    /// Hex public key of the sender
    pub signer: String,
    pub time_stamp: u32,
    pub deadline: u32,
    pub recipient: String,
    /// XEM amount in micro-units
    pub amount: u64,
    /// Fee in micro-XEM
    pub fee: u64,
    pub message: Message,
    pub mosaics: Vec<Mosaic>,
}

/// Transaction version field for a network.
pub fn version_for(network_id: i32) -> i32 {
    (network_id << 24) | TRANSFER_VERSION
}

/// Minutes until a transaction announced now expires.
pub fn due_minutes(network_id: i32) -> u32 {
    if network_id == TESTNET_ID {
        60
    } else {
        24 * 60
    }
}

/// Seconds since the ledger epoch for a unix timestamp.
pub fn nem_timestamp(unix_seconds: i64) -> u32 {
    (unix_seconds - NEM_EPOCH).max(0) as u32
}

impl TransferTransaction {
    /// Canonical binary form; this is what gets signed.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let signer = hex::decode(&self.signer)
            .map_err(|e| GatewayError::Validation(format!("signer is not hex: {e}")))?;
        let payload = hex::decode(&self.message.payload)
            .map_err(|e| GatewayError::Validation(format!("message payload is not hex: {e}")))?;

        let mut out = Vec::with_capacity(256);
        put_u32(&mut out, self.kind);
        put_u32(&mut out, self.version as u32);
        put_u32(&mut out, self.time_stamp);
        put_bytes(&mut out, &signer);
        put_u64(&mut out, self.fee);
        put_u32(&mut out, self.deadline);

        put_bytes(&mut out, self.recipient.as_bytes());
        put_u64(&mut out, self.amount);

        if payload.is_empty() {
            put_u32(&mut out, 0);
        } else {
            put_u32(&mut out, 8 + payload.len() as u32);
            put_u32(&mut out, self.message.kind);
            put_bytes(&mut out, &payload);
        }

        if self.version & 0x00ff_ffff == TRANSFER_VERSION {
            put_u32(&mut out, self.mosaics.len() as u32);
            for mosaic in &self.mosaics {
                let mut id = Vec::new();
                put_bytes(&mut id, mosaic.mosaic_id.namespace_id.as_bytes());
                put_bytes(&mut id, mosaic.mosaic_id.name.as_bytes());

                put_u32(&mut out, (4 + id.len() + 8) as u32);
                put_bytes(&mut out, &id);
                put_u64(&mut out, mosaic.quantity);
            }
        }

        Ok(out)
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Length-prefixed byte string.
fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// Fee for a message, in XEM.
pub fn message_fee(message: &Message) -> f64 {
    if message.payload.is_empty() {
        return 0.0;
    }
    let length = (message.payload.len() / 2) as f64;
    FEE_FACTOR * ((length / 32.0).floor() + 1.0)
}

/// XEM value of a mosaic quantity, in XEM.
fn xem_equivalent(multiplier: u64, quantity: u64, supply: u64, divisibility: u32) -> f64 {
    if supply == 0 {
        return 0.0;
    }
    XEM_SUPPLY * quantity as f64 * multiplier as f64
        / supply as f64
        / 10f64.powi(divisibility as i32 + 6)
}

/// Fee for the attached mosaics, in XEM.
///
/// `multiplier` is the transfer's XEM amount in micro-units. Mosaics
/// missing from `definitions` are priced as if their supply were zero.
pub fn mosaics_fee(
    multiplier: u64,
    mosaics: &[Mosaic],
    definitions: &[MosaicDefinitionMetaDataPair],
) -> f64 {
    let mut total = 0.0;

    for mosaic in mosaics {
        let pair = definitions
            .iter()
            .find(|d| d.mosaic_definition.id == mosaic.mosaic_id);
        let divisibility = pair.map(|p| p.mosaic_definition.divisibility()).unwrap_or(0);
        let supply = pair.map(|p| p.supply).unwrap_or(0);

        let (fee, supply_adjustment) = if supply <= 10_000 && divisibility == 0 {
            // Small business mosaic
            (FEE_FACTOR, 0.0)
        } else {
            let total_quantity = supply as f64 * 10f64.powi(divisibility as i32);
            let adjustment = (0.8 * (MAX_MOSAIC_QUANTITY / total_quantity).floor().ln()).floor();
            let xem = xem_equivalent(multiplier, mosaic.quantity, supply, divisibility).ceil();
            let fee = (xem / 10_000.0).max(1.0).floor().min(25.0);
            (fee, adjustment)
        };

        total += FEE_FACTOR * (fee - supply_adjustment).max(1.0);
    }

    total
}

/// Total fee in micro-XEM.
pub fn total_fee(
    multiplier: u64,
    message: &Message,
    mosaics: &[Mosaic],
    definitions: &[MosaicDefinitionMetaDataPair],
) -> u64 {
    ((message_fee(message) + mosaics_fee(multiplier, mosaics, definitions)) * 1_000_000.0).floor()
        as u64
}
