//! DIM RPC Gateway
//!
//! An HTTP gateway that creates NEM wallets, signs mosaic transfers locally
//! and announces them to ledger nodes.
//!
//! ## Security Model
//!
//! - Private keys are stored only as BIP-38 ciphertext
//! - Transfers are signed in-process; nodes never see a private key
//! - Only loopback clients are served unless configured otherwise

pub mod account;
pub mod broadcast;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod network;
pub mod node_client;
pub mod pipeline;
pub mod rpc;
pub mod transaction;
pub mod transfer;
pub mod vault;

pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use keys::{KeyManager, KeySource};
pub use network::{Connection, Network, NetworkRegistry};
pub use node_client::NodeClient;
pub use pipeline::TransferRequest;
pub use vault::{KvStore, SignedRecord, Vault};
