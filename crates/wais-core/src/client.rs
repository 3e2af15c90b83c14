//! `LinkClient`: client-side link lifecycle, request/response correlation,
//! and the `FileReceiver` drive loop (spec.md §4.5, §4.6).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use wais_files::TransferState;
use wais_transport::{Identity, Link, LinkEvent, TransportAdapter, TransportError};

use crate::error::Error;
use crate::protocol::{Request, Response};

/// Client-side handle to one peer's service link. `request_timeout` bounds
/// both link establishment and every subsequent `request` call, covering
/// both control and data phases (spec.md §5).
pub struct LinkClient {
    transport: Arc<dyn TransportAdapter>,
    aspect: String,
    request_timeout: Duration,
    link: RwLock<Option<Arc<Link>>>,
    // Serializing whole `request` calls under this gate is what enforces
    // "single in-flight get per link" (spec.md §8 P7): a second caller
    // simply waits for the first's request/transfer to finish.
    request_gate: Mutex<()>,
}

impl LinkClient {
    /// Create a client bound to `transport`, targeting links on `aspect`.
    #[must_use]
    pub fn new(transport: Arc<dyn TransportAdapter>, aspect: String, request_timeout: Duration) -> Self {
        Self {
            transport,
            aspect,
            request_timeout,
            link: RwLock::new(None),
            request_gate: Mutex::new(()),
        }
    }

    /// Establish a link to `peer`. Returns `true` only if the link reached
    /// `Active` within `request_timeout`.
    pub async fn establish(&self, peer: Identity) -> bool {
        match self.transport.connect(peer, &self.aspect, self.request_timeout).await {
            Ok(link) => {
                *self.link.write().await = Some(Arc::new(link));
                true
            }
            Err(TransportError::EstablishTimeout) | Err(TransportError::Unreachable) => false,
            Err(err) => {
                warn!(error = %err, "link establishment failed");
                false
            }
        }
    }

    /// Close the underlying link, if any.
    pub async fn close(&self) {
        if let Some(link) = self.link.write().await.take() {
            link.close().await;
        }
    }

    /// Send `request` and wait for a terminal response, including driving a
    /// `get`'s file-receive phase to completion. `work_dir` is where a
    /// received file (and any streaming temp file) is written.
    pub async fn request(&self, request: Request, work_dir: &Path) -> Response {
        let _gate = self.request_gate.lock().await;

        let Some(link) = self.link.read().await.clone() else {
            return Error::Transport(TransportError::NotConnected).into_response();
        };

        let payload = match serde_json::to_vec(&request) {
            Ok(payload) => payload,
            Err(err) => return Response::error(format!("Invalid request: {err}")),
        };

        let request_id = match link.request(payload).await {
            Ok(id) => id,
            Err(err) => return Error::Transport(err).into_response(),
        };

        let deadline = tokio::time::Instant::now() + self.request_timeout;
        drive(&link, request_id, work_dir, deadline).await
    }
}

/// Read events off `link` until a terminal response for `request_id`
/// arrives, driving any intervening file-receive phase, bounded by
/// `deadline`. The deadline is raced inside this loop (rather than via an
/// outer `tokio::time::timeout` wrapping the whole future) so that on
/// expiry any in-flight `TransferState` is explicitly discarded before
/// returning — dropping the future instead would leak a streamed
/// transfer's `.partial` temp file (spec.md §8 P8).
async fn drive(link: &Link, request_id: u64, work_dir: &Path, deadline: tokio::time::Instant) -> Response {
    let mut transfer: Option<TransferState> = None;

    loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                if let Some(state) = transfer.take() {
                    state.discard();
                }
                return Response::error("Timeout");
            }
            event = link.next_event() => match event {
                Some(LinkEvent::Response { request_id: rid, payload }) if rid == request_id => {
                    let response: Response = match serde_json::from_slice(&payload) {
                        Ok(response) => response,
                        Err(err) => return Response::error(format!("Malformed response: {err}")),
                    };
                    if !response.is_file_meta() {
                        return response;
                    }
                    match begin_transfer(&response, work_dir) {
                        Ok(state) => transfer = Some(state),
                        Err(err) => {
                            warn!(error = %err, "failed to begin transfer");
                            return Error::Internal.into_response();
                        }
                    }
                }
                Some(LinkEvent::Response { .. }) => {
                    // Correlated to a different in-flight request; cannot happen
                    // under the single-in-flight-per-link gate, but ignore
                    // defensively rather than misrouting.
                }
                Some(LinkEvent::Data { payload }) => {
                    let Some(state) = transfer.as_mut() else {
                        continue;
                    };
                    if let Err(err) = state.push_chunk(&payload) {
                        let state = transfer.take().unwrap();
                        state.discard();
                        warn!(error = %err, "I/O error receiving transfer chunk");
                        return Error::Internal.into_response();
                    }
                    if state.is_complete() {
                        let state = transfer.take().unwrap();
                        return finalize(state, work_dir);
                    }
                }
                Some(LinkEvent::Request { .. }) => {
                    // Clients never receive inbound requests on a link they
                    // established; ignore.
                }
                Some(LinkEvent::Closed) | None => {
                    if let Some(state) = transfer.take() {
                        state.discard();
                    }
                    return Error::Transport(TransportError::Closed).into_response();
                }
            },
        }
    }
}

fn begin_transfer(meta: &Response, work_dir: &Path) -> std::io::Result<TransferState> {
    TransferState::begin(
        meta.filename.clone().unwrap_or_default(),
        meta.size.unwrap_or(0),
        meta.compressed.unwrap_or(false),
        meta.sha256.clone(),
        work_dir,
    )
}

fn finalize(state: TransferState, work_dir: &Path) -> Response {
    let filename = state.filename().to_string();
    match state.finalize(work_dir) {
        Ok(_path) => Response::ok_message(format!("File '{filename}' received & verified.")),
        Err(err) => Error::Integrity(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wais_transport::MockNetwork;

    #[tokio::test]
    async fn request_without_link_is_not_connected() {
        let net = MockNetwork::new();
        let client_transport = Arc::new(net.join());
        let client = LinkClient::new(client_transport, "svc".to_string(), Duration::from_secs(1));
        let dir = tempfile::tempdir().unwrap();
        let response = client.request(Request::List, dir.path()).await;
        assert_eq!(response.status, "error");
    }

    #[tokio::test]
    async fn establish_fails_without_listener() {
        let net = MockNetwork::new();
        let client_transport = Arc::new(net.join());
        let client = LinkClient::new(client_transport, "svc".to_string(), Duration::from_millis(50));
        let ok = client.establish(wais_transport::Identity::random()).await;
        assert!(!ok);
    }
}
