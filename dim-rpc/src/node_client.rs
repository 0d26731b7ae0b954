//! Ledger Node Client
//!
//! HTTP reads and writes against the current peer of a [`Connection`].
//!
//! - Every request carries the `version` and `port` headers nodes expect
//! - A failed call rotates the connection to another peer for the next call
//! - Failed calls are never retried here

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::{GatewayError, Result},
    network::Connection,
};

/// Default timeout for node requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared HTTP client for ledger nodes.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http })
    }

    /// `GET` a node path and return the raw body.
    ///
    /// A `path` starting with `http` is used as a complete URL.
    pub async fn read(&self, conn: &Connection, path: &str) -> Result<String> {
        let url = resolve_url(conn, path);
        let result = self.send(self.http.get(&url)).await;
        self.rotate_on_failure(conn, &url, result)
    }

    /// `POST` a JSON payload to a node path and return the raw body.
    pub async fn write(&self, conn: &Connection, path: &str, payload: &Value) -> Result<String> {
        let url = resolve_url(conn, path);
        let result = self.send(self.http.post(&url).json(payload)).await;
        self.rotate_on_failure(conn, &url, result)
    }

    /// `GET` a node path and decode the JSON body.
    pub async fn read_json<T: DeserializeOwned>(&self, conn: &Connection, path: &str) -> Result<T> {
        let body = self.read(conn, path).await?;
        decode(&body)
    }

    /// `GET` a complete URL without touching any connection state.
    pub async fn get_url(&self, url: &str) -> Result<String> {
        self.send(self.http.get(url)).await
    }

    /// `POST` JSON to a complete URL without touching any connection state.
    pub async fn post_url(&self, url: &str, payload: &Value) -> Result<String> {
        self.send(self.http.post(url).json(payload)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request
            .header("version", "1.0.0")
            .header("port", "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("HTTP error: {status}")));
        }

        Ok(response.text().await?)
    }

    fn rotate_on_failure(
        &self,
        conn: &Connection,
        url: &str,
        result: Result<String>,
    ) -> Result<String> {
        match result {
            Ok(body) => {
                debug!("Node request {} succeeded ({} bytes)", url, body.len());
                Ok(body)
            }
            Err(e) => {
                warn!("Node request {} failed: {}", url, e);
                conn.rotate_peer();
                Err(e)
            }
        }
    }
}

/// Decode a node JSON body.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn resolve_url(conn: &Connection, path: &str) -> String {
    if path.starts_with("http") {
        path.to_string()
    } else {
        format!("http://{}{}", conn.current_peer(), path)
    }
}
