//! `AnnounceEngine`: periodically advertises the server's service
//! destination with a bounded app-data blob (spec.md §4.2).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wais_transport::TransportAdapter;

use crate::error::DiscoveryError;

/// Hard ceiling on the serialized announce app-data (spec.md §8 P10).
pub const MAX_ANNOUNCE_SIZE: usize = 128;

/// The protocol version advertised in every announce.
pub const PROTOCOL_VERSION: &str = "0.5.0";

#[derive(Serialize)]
struct AppData<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    desc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    v: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caps: Option<&'a [&'a str]>,
}

/// Build the announce app-data blob, dropping optional fields in order
/// (caps, then desc, then v) until it fits [`MAX_ANNOUNCE_SIZE`].
#[must_use]
pub fn build_app_data(name: &str, desc: &str, caps: &[&str]) -> Vec<u8> {
    let attempts: [AppData; 4] = [
        AppData { name, desc: Some(desc), v: Some(PROTOCOL_VERSION), caps: Some(caps) },
        AppData { name, desc: Some(desc), v: Some(PROTOCOL_VERSION), caps: None },
        AppData { name, desc: Some(desc), v: None, caps: None },
        AppData { name, desc: None, v: None, caps: None },
    ];
    for attempt in &attempts {
        if let Ok(bytes) = serde_json::to_vec(attempt) {
            if bytes.len() <= MAX_ANNOUNCE_SIZE {
                return bytes;
            }
        }
    }
    // Even the bare `{"name":...}` form overflowed (a pathologically long
    // name); truncate it to whatever remains, sacrificing valid JSON rather
    // than panicking. This should not happen with reasonable names.
    let mut bytes = serde_json::to_vec(&attempts[3]).unwrap_or_default();
    bytes.truncate(MAX_ANNOUNCE_SIZE);
    bytes
}

/// Drives the periodic announce timer for a [`TransportAdapter`].
pub struct AnnounceEngine {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl AnnounceEngine {
    /// Start announcing on `aspect` every `interval` using `app_data`,
    /// rebuilt fresh on each tick from `app_data_factory`. An `interval` of
    /// zero or less disables announcing entirely (returns an engine whose
    /// `stop()` is a no-op).
    pub fn start(
        transport: Arc<dyn TransportAdapter>,
        aspect: String,
        interval: Duration,
        app_data_factory: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        if interval.is_zero() {
            return Self { handle: None, shutdown: None };
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            // `tokio::time::interval`'s first tick fires immediately, which
            // matches the original announcing once at startup and only then
            // scheduling the next announce (original_source/akita_wais/server.py
            // calls `announce_task()` directly before its first `Timer`).
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let app_data = app_data_factory();
                        if let Err(err) = transport.announce(&aspect, app_data).await {
                            let err = DiscoveryError::from(err);
                            warn!(error = %err, "announce failed");
                        } else {
                            debug!(aspect = %aspect, "announced");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            handle: Some(handle),
            shutdown: Some(shutdown_tx),
        }
    }

    /// Stop the timer. Guarantees no further announce is emitted after this
    /// returns.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_fits_when_small() {
        let bytes = build_app_data("srv", "desc", &["zlib", "sha256"]);
        assert!(bytes.len() <= MAX_ANNOUNCE_SIZE);
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["caps"], serde_json::json!(["zlib", "sha256"]));
    }

    #[test]
    fn oversized_name_drops_optional_fields_in_order() {
        let long_desc = "d".repeat(200);
        let bytes = build_app_data("srv", &long_desc, &["zlib", "sha256"]);
        assert!(bytes.len() <= MAX_ANNOUNCE_SIZE);
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.get("caps").is_none());
    }

    #[tokio::test]
    async fn zero_interval_disables_announcing() {
        let engine: AnnounceEngine = AnnounceEngine {
            handle: None,
            shutdown: None,
        };
        engine.stop().await;
    }

    #[tokio::test]
    async fn first_announce_fires_immediately() {
        use wais_transport::MockNetwork;

        let net = MockNetwork::new();
        let server = net.join();
        let subscriber = net.join();
        let mut announces = subscriber.listen_for_announces("akita.wais.service.v1");

        let engine = AnnounceEngine::start(
            Arc::new(server),
            "akita.wais.service.v1".to_string(),
            Duration::from_secs(3600),
            || build_app_data("srv", "desc", &[]),
        );

        let event = tokio::time::timeout(Duration::from_millis(200), announces.recv())
            .await
            .expect("first announce should fire immediately, not after the full interval")
            .unwrap();
        assert!(!event.app_data.is_empty());

        engine.stop().await;
    }
}
