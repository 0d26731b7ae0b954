//! Peer Registry
//!
//! Static table of the ledger networks the gateway can talk to, and the
//! per-network connection context that node calls are routed through.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Protocol id of the production network (addresses start with `N`).
pub const MAINNET_ID: i32 = 104;

/// Protocol id of the test network (addresses start with `T`).
pub const TESTNET_ID: i32 = -104;

/// Protocol id of the private network (addresses start with `M`).
pub const MIJIN_ID: i32 = 96;

/// A named ledger network and its static peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// Protocol discriminator used for addresses and transaction versions
    pub id: i32,
    /// `host:port` entries
    pub peers: Vec<String>,
}

impl Network {
    pub fn new(name: &str, id: i32, peers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            id,
            peers: peers.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn mainnet() -> Self {
        Self::new(
            "mainnet",
            MAINNET_ID,
            &[
                "hugealice.nem.ninja:7890",
                "alice2.nem.ninja:7890",
                "alice3.nem.ninja:7890",
                "alice4.nem.ninja:7890",
                "alice5.nem.ninja:7890",
                "alice6.nem.ninja:7890",
            ],
        )
    }

    pub fn testnet() -> Self {
        Self::new(
            "testnet",
            TESTNET_ID,
            &[
                "bigalice2.nem.ninja:7890",
                "23.228.67.85:7890",
                "50.3.87.123:7890",
                "37.120.188.83:7890",
            ],
        )
    }

    pub fn mijin() -> Self {
        Self::new("mijin", MIJIN_ID, &["b1.nem.foundation:7891"])
    }

    /// Private networks do not expose `/node/extended-info`.
    pub fn reports_network_id(&self) -> bool {
        self.name != "mijin"
    }
}

/// Resolve the network id from an address's leading character.
///
/// `N` is mainnet, `T` testnet, `M` mijin. Anything else, including an empty
/// string, falls back to mainnet.
pub fn network_id_from_address(address: &str) -> i32 {
    match address.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('T') => TESTNET_ID,
        Some('M') => MIJIN_ID,
        _ => MAINNET_ID,
    }
}

/// Lookup table of known networks.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: HashMap<String, Network>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::from_networks(vec![
            Network::mainnet(),
            Network::testnet(),
            Network::mijin(),
        ])
    }
}

impl NetworkRegistry {
    pub fn from_networks(networks: Vec<Network>) -> Self {
        Self {
            networks: networks.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }

    /// Replace the static peers of known networks.
    ///
    /// Names that are not in the registry are ignored with a warning.
    pub fn with_peer_overrides(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        for (name, peers) in overrides {
            match self.networks.get_mut(name) {
                Some(network) if !peers.is_empty() => {
                    debug!("Using {} configured peers for {}", peers.len(), name);
                    network.peers = peers.clone();
                }
                Some(_) => warn!("Ignoring empty peer list for {}", name),
                None => warn!("Ignoring peers for unknown network {}", name),
            }
        }
        self
    }

    pub fn select(&self, name: &str) -> Result<Network> {
        self.networks
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("network {name}")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.networks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Connection context for one network.
///
/// The peer list starts as the network's static peers and may be replaced by
/// discovery. Failover changes `current_peer` but never the network.
#[derive(Debug)]
pub struct Connection {
    network: Network,
    peers: RwLock<Vec<String>>,
    current_peer: RwLock<String>,
    node_network_id: RwLock<Option<i32>>,
}

impl Connection {
    /// Create a context with a randomly chosen static peer selected.
    pub fn new(network: Network) -> Self {
        let current = network
            .peers
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();

        Self {
            peers: RwLock::new(network.peers.clone()),
            current_peer: RwLock::new(current),
            node_network_id: RwLock::new(None),
            network,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_id(&self) -> i32 {
        self.network.id
    }

    pub fn current_peer(&self) -> String {
        self.current_peer.read().clone()
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.read().clone()
    }

    /// Switch to a pseudo-random peer from the current list.
    ///
    /// Peers other than the failing one are preferred when the list has any.
    pub fn rotate_peer(&self) -> Option<String> {
        let current = self.current_peer();
        let next = {
            let peers = self.peers.read();
            let others: Vec<&String> = peers.iter().filter(|p| **p != current).collect();
            let mut rng = rand::thread_rng();
            match others.choose(&mut rng) {
                Some(peer) => (*peer).clone(),
                None => peers.choose(&mut rng)?.clone(),
            }
        };
        let previous = std::mem::replace(&mut *self.current_peer.write(), next.clone());
        debug!("Rotated {} peer {} -> {}", self.network.name, previous, next);
        Some(next)
    }

    /// Adopt a discovered peer list; its first entry becomes current.
    ///
    /// An empty list leaves the context unchanged.
    pub fn replace_peers(&self, peers: Vec<String>) {
        let Some(first) = peers.first().cloned() else {
            return;
        };
        *self.peers.write() = peers;
        *self.current_peer.write() = first;
    }

    pub fn node_network_id(&self) -> Option<i32> {
        *self.node_network_id.read()
    }

    pub fn set_node_network_id(&self, id: i32) {
        if id != self.network.id {
            warn!(
                "Node {} reports network id {} but {} expects {}",
                self.current_peer(),
                id,
                self.network.name,
                self.network.id
            );
        }
        *self.node_network_id.write() = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_from_address() {
        assert_eq!(
            network_id_from_address("NA3SH7QUTG6OS4EGHSES426552FAJYZR2NRCQQGW"),
            MAINNET_ID
        );
        assert_eq!(network_id_from_address("TD23FHYZQPYUEIZ67VN5"), TESTNET_ID);
        assert_eq!(network_id_from_address("td23fhyz"), TESTNET_ID);
        assert_eq!(network_id_from_address("MD23FHYZ"), MIJIN_ID);
        assert_eq!(network_id_from_address("XYZ"), MAINNET_ID);
        assert_eq!(network_id_from_address(""), MAINNET_ID);
    }

    #[test]
    fn test_registry_select() {
        let registry = NetworkRegistry::default();
        assert_eq!(registry.select("mainnet").unwrap().id, MAINNET_ID);
        assert_eq!(registry.select("testnet").unwrap().id, TESTNET_ID);
        assert_eq!(registry.select("mijin").unwrap().id, MIJIN_ID);
        assert_eq!(registry.names(), vec!["mainnet", "mijin", "testnet"]);

        let err = registry.select("devnet").unwrap_err();
        assert_eq!(err.to_string(), "Could not find network devnet");
    }

    #[test]
    fn test_peer_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("testnet".to_string(), vec!["127.0.0.1:7890".to_string()]);
        overrides.insert("devnet".to_string(), vec!["127.0.0.1:7891".to_string()]);
        overrides.insert("mijin".to_string(), vec![]);

        let registry = NetworkRegistry::default().with_peer_overrides(&overrides);
        assert_eq!(registry.select("testnet").unwrap().peers, vec!["127.0.0.1:7890"]);
        assert_eq!(registry.select("mijin").unwrap().peers, Network::mijin().peers);
        assert!(registry.select("devnet").is_err());
    }

    #[test]
    fn test_connection_starts_on_static_peer() {
        let network = Network::mainnet();
        let conn = Connection::new(network.clone());
        assert!(network.peers.contains(&conn.current_peer()));
        assert_eq!(conn.peers(), network.peers);
    }

    #[test]
    fn test_rotate_stays_within_peer_list() {
        let conn = Connection::new(Network::testnet());
        for _ in 0..20 {
            let before = conn.current_peer();
            let next = conn.rotate_peer().unwrap();
            assert!(conn.peers().contains(&next));
            assert_ne!(before, next);
            assert_eq!(conn.current_peer(), next);
        }
    }

    #[test]
    fn test_rotate_single_peer() {
        let conn = Connection::new(Network::mijin());
        assert_eq!(conn.rotate_peer().unwrap(), "b1.nem.foundation:7891");
        assert_eq!(conn.current_peer(), "b1.nem.foundation:7891");

        let empty = Connection::new(Network::new("empty", MAINNET_ID, &[]));
        assert_eq!(empty.rotate_peer(), None);
    }

    #[test]
    fn test_replace_peers() {
        let conn = Connection::new(Network::testnet());
        conn.replace_peers(vec![]);
        assert_eq!(conn.peers(), Network::testnet().peers);

        conn.replace_peers(vec!["10.0.0.1:7890".into(), "10.0.0.2:7890".into()]);
        assert_eq!(conn.current_peer(), "10.0.0.1:7890");
        assert_eq!(conn.peers().len(), 2);
    }

    #[test]
    fn test_node_network_id() {
        let conn = Connection::new(Network::mijin());
        assert!(!conn.network().reports_network_id());
        assert_eq!(conn.node_network_id(), None);
        conn.set_node_network_id(MIJIN_ID);
        assert_eq!(conn.node_network_id(), Some(MIJIN_ID));
    }
}
