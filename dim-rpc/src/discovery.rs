//! Peer Discovery
//!
//! Refreshes a network's peer list from the node it is connected to, and
//! manages the lifecycle of per-network connections:
//!
//! `Unconnected -> Connecting -> Connected`
//!
//! Connecting picks a random static peer, asks it for its reachable peers and
//! probes each of them. Discovery is best-effort; when it yields nothing the
//! static peers stay in place.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    network::{Connection, NetworkRegistry},
    node_client::{decode, NodeClient},
};

/// Body returned by an unreachable-but-listening node
const FORBIDDEN_BODY: &str = "Forbidden";

#[derive(Debug, Deserialize)]
struct PeerList {
    #[serde(default)]
    data: Vec<PeerEntry>,
}

#[derive(Debug, Deserialize)]
struct PeerEntry {
    endpoint: Option<Endpoint>,
    // Older nodes report the address at the top level
    ip: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    host: String,
    port: u16,
}

impl PeerEntry {
    fn address(&self) -> Option<String> {
        match (&self.endpoint, &self.ip, self.port) {
            (Some(endpoint), _, _) => Some(format!("{}:{}", endpoint.host, endpoint.port)),
            (None, Some(ip), Some(port)) => Some(format!("{ip}:{port}")),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtendedInfo {
    node: NodeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfo {
    meta_data: NodeMetaData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeMetaData {
    network_id: i32,
}

/// Ask the current peer for its reachable peers and keep the ones that answer.
///
/// Never fails: any error yields an empty list.
pub async fn discover_reachable_peers(client: &NodeClient, conn: &Connection) -> Vec<String> {
    let body = match client.read(conn, "/node/peer-list/reachable").await {
        Ok(body) => body,
        Err(e) => {
            debug!("Peer list unavailable: {}", e);
            return Vec::new();
        }
    };

    let candidates: Vec<String> = match decode::<PeerList>(&body) {
        Ok(list) => list.data.iter().filter_map(PeerEntry::address).collect(),
        Err(e) => {
            debug!("Unreadable peer list: {}", e);
            return Vec::new();
        }
    };

    let probes = candidates.iter().map(|peer| async move {
        let url = format!("http://{peer}/chain/height");
        match client.get_url(&url).await {
            Ok(body) if body != FORBIDDEN_BODY => Some(peer.clone()),
            Ok(_) => {
                debug!("Peer {} refused the probe", peer);
                None
            }
            Err(e) => {
                debug!("Peer {} unreachable: {}", peer, e);
                None
            }
        }
    });

    let reachable: Vec<String> = join_all(probes).await.into_iter().flatten().collect();
    debug!(
        "{} of {} candidate peers reachable",
        reachable.len(),
        candidates.len()
    );
    reachable
}

/// Ask the current peer which network it serves.
async fn fetch_node_network_id(client: &NodeClient, conn: &Connection) -> Result<i32> {
    let info: ExtendedInfo = client.read_json(conn, "/node/extended-info").await?;
    Ok(info.node.meta_data.network_id)
}

/// Observable lifecycle of a network's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected { peer: String },
}

/// Per-network connection manager.
///
/// Concurrent first requests for a network share a single connect.
pub struct Connections {
    registry: NetworkRegistry,
    client: NodeClient,
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<Connection>>>>>,
}

impl Connections {
    pub fn new(registry: NetworkRegistry, client: NodeClient) -> Self {
        Self {
            registry,
            client,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Get the connection for a network, connecting on first use.
    pub async fn connect(&self, name: &str) -> Result<Arc<Connection>> {
        let network = self.registry.select(name)?;

        let slot = self
            .slots
            .lock()
            .entry(network.name.clone())
            .or_default()
            .clone();

        let conn = slot
            .get_or_init(|| async {
                let conn = Arc::new(Connection::new(network));
                self.establish(&conn).await;
                conn
            })
            .await;

        Ok(conn.clone())
    }

    pub fn state(&self, name: &str) -> ConnectionState {
        match self.slots.lock().get(name) {
            None => ConnectionState::Unconnected,
            Some(slot) => match slot.get() {
                None => ConnectionState::Connecting,
                Some(conn) => ConnectionState::Connected {
                    peer: conn.current_peer(),
                },
            },
        }
    }

    async fn establish(&self, conn: &Connection) {
        info!(
            "Connecting to {} via {}",
            conn.network().name,
            conn.current_peer()
        );

        let network_id = async {
            if conn.network().reports_network_id() {
                Some(fetch_node_network_id(&self.client, conn).await)
            } else {
                None
            }
        };
        let (peers, network_id) =
            tokio::join!(discover_reachable_peers(&self.client, conn), network_id);

        match network_id {
            Some(Ok(id)) => conn.set_node_network_id(id),
            Some(Err(e)) => warn!("Could not read node network id: {}", e),
            None => {}
        }

        if peers.is_empty() {
            info!(
                "No reachable peers discovered, keeping {} static peers",
                conn.peers().len()
            );
        } else {
            info!("Discovered {} reachable peers", peers.len());
            conn.replace_peers(peers);
        }

        info!(
            "Connected to {} via {}",
            conn.network().name,
            conn.current_peer()
        );
    }
}
