//! Broadcasting
//!
//! Announces signed transfers to the network's peers. Announcements are
//! fire-and-forget: the caller is answered once the fan-out is dispatched and
//! individual peer failures are only logged.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    error::{GatewayError, Result},
    gateway::Gateway,
    vault::SignedRecord,
};

/// Number of peers a transaction is announced to
pub const BROADCAST_FANOUT: usize = 10;

impl Gateway {
    /// Announce a signed payload to the first peers of `network`.
    pub async fn broadcast(&self, network: &str, serialized: &str, signature: &str) -> Result<()> {
        let conn = self.connect(network).await?;
        let peers: Vec<String> = conn.peers().into_iter().take(BROADCAST_FANOUT).collect();

        info!("Announcing transaction to {} peers", peers.len());

        let payload = json!({
            "data": serialized,
            "signature": signature,
        });

        for peer in peers {
            let client = self.client().clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let url = format!("http://{peer}/transaction/announce");
                match client.post_url(&url, &payload).await {
                    Ok(body) => debug!("Peer {} answered announce: {}", peer, body),
                    Err(e) => warn!("Announce to {} failed: {}", peer, e),
                }
            });
        }

        Ok(())
    }

    /// Broadcast a stored transfer by id.
    ///
    /// When no record exists under `id`, the `fallback` payload supplied with
    /// the request is announced instead. Returns what was announced.
    pub async fn broadcast_by_id(
        &self,
        network: &str,
        id: Option<&str>,
        fallback: BroadcastPayload,
    ) -> Result<SignedRecord> {
        let stored = match id.filter(|id| !id.is_empty()) {
            Some(id) => self.vault().get_record(id).await?,
            None => None,
        };

        let record = match stored {
            Some(record) => record,
            None => fallback.into_record()?,
        };

        self.broadcast(network, &record.serialized, &record.signature)
            .await?;
        Ok(record)
    }
}

/// Externally signed payload supplied with a broadcast request.
#[derive(Debug, Default, Clone)]
pub struct BroadcastPayload {
    pub serialized: Option<String>,
    pub signature: Option<String>,
}

impl BroadcastPayload {
    fn into_record(self) -> Result<SignedRecord> {
        match (self.serialized, self.signature) {
            (Some(serialized), Some(signature))
                if !serialized.is_empty() && !signature.is_empty() =>
            {
                Ok(SignedRecord {
                    serialized,
                    tx: None,
                    signature,
                })
            }
            _ => Err(GatewayError::Validation(
                "unknown transaction id and no serialized payload".to_string(),
            )),
        }
    }
}
