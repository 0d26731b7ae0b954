//! Shared fixtures for gateway integration tests.
//!
//! [`MockNode`] is an in-process ledger node answering the handful of
//! endpoints the gateway reads, and recording every announced transaction.

#![allow(dead_code)]

use async_trait::async_trait;
use dim_crypto_nem::bip38::Bip38Params;
use dim_rpc::{
    error::{GatewayError, Result},
    network::TESTNET_ID,
    vault::LmdbStore,
    Gateway, KvStore, Network, NetworkRegistry, NodeClient, Vault,
};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_PRIVATE_KEY: &str =
    "dd19f3f3178c0867771eed180310a484e1b76527f7a271e3c8b5264e4a5aa414";
pub const TEST_PUBLIC_KEY: &str =
    "5645ea5b6bfc9bce6e69eab6002281d0e9c52fc0405ab99533d28e497b96ed81";
pub const TESTNET_RECIPIENT: &str = "TD23FHYZQPYUEIZ67VN5LHLGYGABGSGZLL7VVX44";

/// Cheap scrypt parameters so tests stay fast
pub fn light_params() -> Bip38Params {
    Bip38Params {
        log_n: 4,
        r: 8,
        p: 1,
    }
}

pub struct MockNode {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    announces: Mutex<Vec<Value>>,
    reachable_peers: Mutex<Vec<String>>,
    refuse_probes: AtomicBool,
}

impl MockNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| respond(req, shared.clone()));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, state }
    }

    /// A node that answers height probes with the `Forbidden` body.
    pub async fn start_refusing() -> Self {
        let node = Self::start().await;
        node.state.refuse_probes.store(true, Ordering::SeqCst);
        node
    }

    pub fn peer(&self) -> String {
        self.addr.to_string()
    }

    /// Peers listed by `/node/peer-list/reachable`.
    pub fn set_reachable_peers(&self, peers: &[String]) {
        *self.state.reachable_peers.lock() = peers.to_vec();
    }

    pub fn announce_count(&self) -> usize {
        self.state.announces.lock().len()
    }

    /// Wait until at least `count` announces arrived, or give up after ~2s.
    pub async fn wait_for_announces(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let seen = self.state.announces.lock().clone();
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.state.announces.lock().clone()
    }
}

fn dim_definition_page() -> Value {
    json!({
        "data": [{
            "meta": {"id": 26},
            "mosaic": {
                "creator": TEST_PUBLIC_KEY,
                "description": "DIM COIN",
                "id": {"namespaceId": "dim", "name": "coin"},
                "properties": [
                    {"name": "divisibility", "value": "6"},
                    {"name": "initialSupply", "value": "9000000"},
                    {"name": "supplyMutable", "value": "false"},
                    {"name": "transferable", "value": "true"}
                ],
                "levy": {}
            }
        }]
    })
}

fn peer_list_page(peers: &[String]) -> Value {
    let data: Vec<Value> = peers
        .iter()
        .filter_map(|peer| peer.rsplit_once(':'))
        .map(|(host, port)| {
            let port: u16 = port.parse().unwrap();
            json!({"endpoint": {"protocol": "http", "host": host, "port": port}})
        })
        .collect();
    json!({ "data": data })
}

async fn respond(
    req: Request<Incoming>,
    state: Arc<MockState>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let query = parts.uri.query().unwrap_or("").to_string();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let reply = match (parts.method.as_str(), parts.uri.path()) {
        ("GET", "/node/peer-list/reachable") => peer_list_page(&state.reachable_peers.lock()),
        ("GET", "/node/extended-info") => {
            json!({"node": {"metaData": {"networkId": TESTNET_ID, "application": "NIS"}}})
        }
        ("GET", "/chain/height") if state.refuse_probes.load(Ordering::SeqCst) => {
            return Ok(Response::new(Full::new(Bytes::from("Forbidden"))));
        }
        ("GET", "/chain/height") => json!({"height": 1}),
        ("GET", "/namespace/mosaic/definition/page") if query == "namespace=dim" => {
            dim_definition_page()
        }
        ("GET", "/namespace/mosaic/definition/page") => json!({"data": []}),
        ("GET", "/mosaic/supply") => json!({"supply": 9_000_000}),
        ("GET", "/account/get") => {
            json!({"account": {"query": query}, "meta": {"status": "LOCKED"}})
        }
        ("GET", "/account/transfers/all") => json!({"data": [], "query": query}),
        ("POST", "/transaction/announce") => {
            state
                .announces
                .lock()
                .push(serde_json::from_slice(&body).unwrap_or(Value::Null));
            json!({"type": 1, "code": 1, "message": "SUCCESS"})
        }
        _ => {
            let mut response = Response::new(Full::new(Bytes::from("Not Found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            return Ok(response);
        }
    };

    Ok(Response::new(Full::new(Bytes::from(reply.to_string()))))
}

/// In-memory store that can be inspected after the fact.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        Err(GatewayError::Persistence("disk full".to_string()))
    }
}

pub fn lmdb_store(dir: &TempDir) -> Arc<dyn KvStore> {
    Arc::new(LmdbStore::open(&dir.path().join("vault.mdb")).unwrap())
}

/// Gateway whose `testnet` points only at `node`.
pub fn gateway(node: &MockNode, store: Arc<dyn KvStore>) -> Gateway {
    gateway_with_peers(&[node.peer()], store)
}

/// Gateway whose `testnet` has `peers` as its static peers.
pub fn gateway_with_peers(peers: &[String], store: Arc<dyn KvStore>) -> Gateway {
    let peers: Vec<&str> = peers.iter().map(String::as_str).collect();
    let registry =
        NetworkRegistry::from_networks(vec![Network::new("testnet", TESTNET_ID, &peers)]);
    let client = NodeClient::new(Duration::from_secs(2)).unwrap();
    Gateway::new(registry, client, Vault::new(store), light_params())
}

/// An address nothing listens on.
pub const CLOSED_PEER: &str = "127.0.0.1:1";
