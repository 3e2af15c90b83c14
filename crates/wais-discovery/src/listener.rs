//! `DiscoveryListener`: subscribes to announces and feeds the [`PeerCache`]
//! (spec.md §4.1).

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wais_transport::{AnnounceEvent, Identity, TransportAdapter};

use crate::error::DiscoveryError;
use crate::peer_cache::{PeerCache, PeerRecord};

/// The well-known aspect servers announce their service destination on
/// (spec.md §6), re-checked against each announce's own aspect set
/// regardless of which aspect the subscription was made on.
pub const SERVICE_ASPECT: &str = "akita.wais.service.v1";

/// Default aspect discovery listeners subscribe to (spec.md §6).
pub const DISCOVERY_ASPECT: &str = "akita.wais.discovery.v1";

#[derive(Deserialize)]
struct AnnounceAppData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    #[allow(dead_code)]
    v: String,
    #[serde(default)]
    caps: HashSet<String>,
}

/// Spawns a background task that feeds `cache` from announces observed on
/// `transport`. Dropping the returned handle does not stop the task; abort
/// it explicitly if early shutdown is needed.
pub fn spawn(
    transport: Arc<dyn TransportAdapter>,
    aspect: String,
    self_identity: Identity,
    cache: PeerCache,
) -> JoinHandle<()> {
    let mut announces = transport.listen_for_announces(&aspect);
    tokio::spawn(async move {
        loop {
            match announces.recv().await {
                Ok(event) => handle_announce(event, self_identity, &cache),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "discovery listener fell behind, some announces were dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn handle_announce(event: AnnounceEvent, self_identity: Identity, cache: &PeerCache) {
    if !event.aspects.iter().any(|a| a == SERVICE_ASPECT) {
        return;
    }
    if event.identity == self_identity {
        return;
    }

    let parsed: AnnounceAppData = match serde_json::from_slice(&event.app_data) {
        Ok(parsed) => parsed,
        Err(err) => {
            let err = DiscoveryError::from(err);
            warn!(error = %err, "dropping malformed announce app-data");
            return;
        }
    };

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    cache.upsert(PeerRecord {
        identity_hex: event.identity.to_hex(),
        name: parsed.name,
        description: parsed.desc,
        capabilities: parsed.caps,
        last_seen_unix_sec: now,
        extra: serde_json::Map::new(),
    });
    debug!(peer = %event.identity, "upserted peer from announce");
}
