//! HTTP Server
//!
//! REST-style routes under `/:network/...` for wallet creation, transfer
//! signing and broadcasting.
//!
//! Responses are `{"success": true, ...}` or `{"success": false, "err": ...}`.
//! Account reads pass the node's JSON through unchanged.

pub mod access;
pub mod params;

pub use access::HostFilter;
pub use params::Params;

use anyhow::Result;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::{
    broadcast::BroadcastPayload,
    error::GatewayError,
    gateway::Gateway,
    keys::KeySource,
    pipeline::TransferRequest,
};

/// Shared server state
pub struct RpcState {
    pub gateway: Gateway,
    pub filter: HostFilter,
}

impl RpcState {
    pub fn new(gateway: Gateway, filter: HostFilter) -> Self {
        Self { gateway, filter }
    }
}

/// How a transfer route obtains its signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyMode {
    Vault,
    DirectKey,
    Brain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    VaultAccount { user_id: String },
    Account { address: String },
    CreateWallet(KeyMode),
    Transfers { address: String },
    Transfer(KeyMode),
    Broadcast,
}

/// Percent-decode a captured path segment.
fn segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Match a request to `(network, route)`.
///
/// Literal segments are matched raw; captured ones are percent-decoded.
fn route(method: &Method, path: &str) -> Option<(String, Route)> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let matched = match (method.as_str(), segments.as_slice()) {
        ("GET", [_, "account", "bip38", user_id]) => Route::VaultAccount {
            user_id: segment(user_id),
        },
        ("GET", [_, "account", address]) => Route::Account {
            address: segment(address),
        },
        ("POST", [_, "account"]) | ("POST", [_, "account", "bip38"]) => {
            Route::CreateWallet(KeyMode::Vault)
        }
        ("POST", [_, "account", "bip32"]) => Route::CreateWallet(KeyMode::DirectKey),
        ("POST", [_, "account", "brainwallet"]) => Route::CreateWallet(KeyMode::Brain),
        ("GET", [_, "transactions", address]) => Route::Transfers {
            address: segment(address),
        },
        ("POST", [_, "transaction"]) | ("POST", [_, "transaction", "bip38"]) => {
            Route::Transfer(KeyMode::Vault)
        }
        ("POST", [_, "transaction", "bip32"]) => Route::Transfer(KeyMode::DirectKey),
        ("POST", [_, "transaction", "brainwallet"]) => Route::Transfer(KeyMode::Brain),
        ("POST", [_, "broadcast"]) => Route::Broadcast,
        _ => return None,
    };

    let network = segments.first().filter(|s| !s.is_empty())?;
    Some((segment(network), matched))
}

/// Start the HTTP server on `addr`
pub async fn start_rpc_server(addr: SocketAddr, state: Arc<RpcState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Serve requests from an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<RpcState>) -> Result<()> {
    info!("dim-rpc listening on {}", listener.local_addr()?);

    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(|req| handle_request(req, remote, state.clone()));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    remote: SocketAddr,
    state: Arc<RpcState>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let matched = route(&parts.method, &path);

    // Broadcasting is open to every host
    let open = matches!(matched, Some((_, Route::Broadcast)));
    if !open && !state.filter.is_allowed(remote.ip()) {
        warn!("Rejected {} {} from {}", parts.method, path, remote);
        return Ok(empty_response(StatusCode::FORBIDDEN));
    }

    let Some((network, route)) = matched else {
        debug!("No route for {} {}", parts.method, path);
        let err = format!("{} {} does not exist", parts.method, path);
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            &json!({ "success": false, "err": err }),
        ));
    };

    debug!("{} {} from {}", parts.method, path, remote);

    if let Err(e) = state.gateway.connections().registry().select(&network) {
        return Ok(json_response(
            StatusCode::OK,
            &json!({ "success": false, "error": e.to_string() }),
        ));
    }

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return Ok(empty_response(StatusCode::BAD_REQUEST));
        }
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok());
    let params = match Params::from_parts(
        &[("network", network.as_str())],
        parts.uri.query(),
        content_type,
        &body,
    ) {
        Ok(params) => params,
        Err(e) => return Ok(json_response(StatusCode::OK, &failure(&e))),
    };

    let response = match dispatch(&state.gateway, &network, route, &params).await {
        Ok(value) => value,
        Err(e) => {
            debug!("{} {} failed: {}", parts.method, path, e);
            failure(&e)
        }
    };

    Ok(json_response(StatusCode::OK, &response))
}

async fn dispatch(
    gateway: &Gateway,
    network: &str,
    route: Route,
    params: &Params,
) -> crate::error::Result<Value> {
    match route {
        Route::VaultAccount { user_id } => {
            let wif = gateway.get_vault_account(&user_id).await?;
            Ok(json!({ "success": true, "wif": wif }))
        }
        Route::Account { address } => gateway.get_account(network, &address).await,
        Route::Transfers { address } => {
            let id = params.u64("id")?;
            gateway.get_transfers(network, &address, id).await
        }
        Route::CreateWallet(KeyMode::Vault) => {
            let user_id = params.required("userid")?;
            let passphrase = params.required("bip38")?;
            let wallet = gateway
                .create_vault_wallet(network, &user_id, &passphrase)
                .await?;
            Ok(json!({
                "success": true,
                "publicKey": wallet.public_key,
                "address": wallet.address,
                "wif": wallet.wif,
            }))
        }
        Route::CreateWallet(KeyMode::DirectKey) => {
            let private_key = params.required("privateKey")?;
            let account = gateway
                .create_private_key_wallet(network, &private_key)
                .await?;
            Ok(json!({ "success": true, "account": account }))
        }
        Route::CreateWallet(KeyMode::Brain) => {
            let passphrase = params.required("passphrase")?;
            let account = gateway.create_brain_wallet(network, &passphrase).await?;
            Ok(json!({ "success": true, "account": account }))
        }
        Route::Transfer(mode) => {
            let source = match mode {
                KeyMode::Vault => {
                    KeySource::vault_backed(params.string("userid"), params.string("bip38"))?
                }
                KeyMode::DirectKey => KeySource::direct_key(params.string("privateKey"))?,
                KeyMode::Brain => KeySource::brain_derived(params.string("passphrase"))?,
            };
            let request = TransferRequest::new(
                source,
                params.string("recipient"),
                params.u64("amount")?,
                params.string("currency"),
            )?;
            let transaction = gateway.create_transfer(network, &request).await?;
            Ok(json!({ "success": true, "transaction": transaction }))
        }
        Route::Broadcast => {
            let id = params.string("id");
            let fallback = BroadcastPayload {
                serialized: params.string("serialized"),
                signature: params.string("signature"),
            };
            let record = gateway
                .broadcast_by_id(network, id.as_deref(), fallback)
                .await?;
            Ok(json!({ "success": true, "transaction": record }))
        }
    }
}

fn failure(e: &GatewayError) -> Value {
    json!({ "success": false, "err": e.to_string() })
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed(method: Method, path: &str) -> Option<(String, Route)> {
        route(&method, path)
    }

    #[test]
    fn test_account_routes() {
        assert_eq!(
            routed(Method::GET, "/testnet/account/bip38/alice"),
            Some((
                "testnet".to_string(),
                Route::VaultAccount {
                    user_id: "alice".to_string()
                }
            ))
        );
        assert_eq!(
            routed(Method::GET, "/mainnet/account/NA3SH7"),
            Some((
                "mainnet".to_string(),
                Route::Account {
                    address: "NA3SH7".to_string()
                }
            ))
        );
        assert_eq!(
            routed(Method::POST, "/mainnet/account").map(|r| r.1),
            Some(Route::CreateWallet(KeyMode::Vault))
        );
        assert_eq!(
            routed(Method::POST, "/mainnet/account/bip38").map(|r| r.1),
            Some(Route::CreateWallet(KeyMode::Vault))
        );
        assert_eq!(
            routed(Method::POST, "/mainnet/account/bip32").map(|r| r.1),
            Some(Route::CreateWallet(KeyMode::DirectKey))
        );
        assert_eq!(
            routed(Method::POST, "/mainnet/account/brainwallet").map(|r| r.1),
            Some(Route::CreateWallet(KeyMode::Brain))
        );
    }

    #[test]
    fn test_transaction_routes() {
        assert_eq!(
            routed(Method::GET, "/testnet/transactions/TA").map(|r| r.1),
            Some(Route::Transfers {
                address: "TA".to_string()
            })
        );
        assert_eq!(
            routed(Method::POST, "/testnet/transaction").map(|r| r.1),
            Some(Route::Transfer(KeyMode::Vault))
        );
        assert_eq!(
            routed(Method::POST, "/testnet/transaction/bip32").map(|r| r.1),
            Some(Route::Transfer(KeyMode::DirectKey))
        );
        assert_eq!(
            routed(Method::POST, "/testnet/transaction/brainwallet").map(|r| r.1),
            Some(Route::Transfer(KeyMode::Brain))
        );
        assert_eq!(
            routed(Method::POST, "/testnet/broadcast"),
            Some(("testnet".to_string(), Route::Broadcast))
        );
    }

    #[test]
    fn test_captured_segments_are_decoded() {
        assert_eq!(
            routed(Method::GET, "/testnet/account/bip38/alice%40example.com"),
            Some((
                "testnet".to_string(),
                Route::VaultAccount {
                    user_id: "alice@example.com".to_string()
                }
            ))
        );
        assert_eq!(
            routed(Method::GET, "/testnet/account/bip38/bob%20smith%2Fhome").map(|r| r.1),
            Some(Route::VaultAccount {
                user_id: "bob smith/home".to_string()
            })
        );
        // `+` is literal in a path
        assert_eq!(
            routed(Method::GET, "/testnet/transactions/a+b").map(|r| r.1),
            Some(Route::Transfers {
                address: "a+b".to_string()
            })
        );
        // An escaped slash never splits a segment
        assert_eq!(
            routed(Method::GET, "/testnet/account/x%2Fy").map(|r| r.1),
            Some(Route::Account {
                address: "x/y".to_string()
            })
        );
    }

    #[test]
    fn test_unmatched_routes() {
        assert_eq!(routed(Method::GET, "/testnet/broadcast"), None);
        assert_eq!(routed(Method::POST, "/testnet/account/NA3SH7/extra"), None);
        assert_eq!(routed(Method::GET, "/"), None);
        assert_eq!(routed(Method::DELETE, "/testnet/account"), None);
    }

    #[test]
    fn test_failure_body() {
        let body = failure(&GatewayError::Validation("missing recipient".to_string()));
        assert_eq!(body["success"], false);
        assert_eq!(body["err"], "Wrong parameters: missing recipient");
    }

    #[test]
    fn test_json_response_headers() {
        let response = json_response(StatusCode::OK, &json!({ "success": true }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
