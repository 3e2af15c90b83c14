//! The transport adapter trait: the minimal contract the session engine in
//! `wais-core` needs from a mesh overlay. Real implementations would wrap a
//! library like Reticulum; [`crate::mock::MockTransport`] is an in-process
//! stand-in used by tests and by the binaries until a real backend is wired
//! in.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::debug;

use crate::error::TransportError;
use crate::identity::Identity;

/// Default per-frame payload limit, mirroring a small-MTU mesh link.
/// `FileSender` chunks raw data to half this size (spec.md §4.4).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 500;

/// An announce observed on a subscribed aspect.
#[derive(Debug, Clone)]
pub struct AnnounceEvent {
    /// Identity that emitted the announce.
    pub identity: Identity,
    /// Aspects associated with the announcing destination.
    pub aspects: Vec<String>,
    /// Opaque application payload, at most [`crate::MAX_ANNOUNCE_PAYLOAD`] bytes.
    pub app_data: Vec<u8>,
}

/// Link lifecycle state (spec.md §3, `LinkSession`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Established but not yet confirmed active.
    Pending,
    /// Ready to carry requests and raw data.
    Active,
    /// Torn down; no further operations will succeed.
    Closed,
}

/// A correlation id assigned by the transport to an in-flight request.
pub type RequestId = u64;

/// Something arriving on a link: an inbound request (server side), an
/// inbound response or raw data chunk (client side), or link teardown.
///
/// This is the typed event queue design.md §9 calls for in place of the
/// original's shared-mutable callback state: exactly one task per link
/// drains these and mutates local state.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A JSON request frame addressed to this link (server side).
    Request { request_id: RequestId, payload: Vec<u8> },
    /// A JSON response frame correlated to a prior request (client side).
    Response { request_id: RequestId, payload: Vec<u8> },
    /// A raw (non-JSON) data frame, used for file chunk streaming.
    Data { payload: Vec<u8> },
    /// The link closed; no further events follow.
    Closed,
}

/// A single reliable, session-oriented, single-destination channel.
///
/// Both ends of a link use the same handle type: the server calls
/// [`Link::respond`] and [`Link::send_raw`] in answer to `Request` events;
/// the client calls [`Link::request`] and reads `Response`/`Data` events.
pub struct Link {
    peer: Identity,
    status: std::sync::Arc<tokio::sync::RwLock<LinkStatus>>,
    next_request_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
    outbound: mpsc::Sender<LinkEvent>,
    inbound: Mutex<mpsc::Receiver<LinkEvent>>,
    closed_emitted: std::sync::atomic::AtomicBool,
}

impl Link {
    pub(crate) fn new(
        peer: Identity,
        status: std::sync::Arc<tokio::sync::RwLock<LinkStatus>>,
        next_request_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
        outbound: mpsc::Sender<LinkEvent>,
        inbound: mpsc::Receiver<LinkEvent>,
    ) -> Self {
        Self {
            peer,
            status,
            next_request_id,
            outbound,
            inbound: Mutex::new(inbound),
            closed_emitted: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Identity at the other end of the link.
    #[must_use]
    pub fn peer(&self) -> Identity {
        self.peer
    }

    /// Current link status.
    pub async fn status(&self) -> LinkStatus {
        *self.status.read().await
    }

    /// Submit a JSON request frame. Returns the correlation id the remote
    /// end will echo back on its response(s); does not wait for a reply.
    ///
    /// # Errors
    /// Returns [`TransportError::NotConnected`] if the link is not Active.
    pub async fn request(&self, payload: Vec<u8>) -> Result<RequestId, TransportError> {
        if self.status().await != LinkStatus::Active {
            return Err(TransportError::NotConnected);
        }
        let request_id = self
            .next_request_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.outbound
            .send(LinkEvent::Request { request_id, payload })
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(request_id)
    }

    /// Send a JSON response frame correlated to `request_id` (server side).
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the link has torn down.
    pub async fn respond(&self, request_id: RequestId, payload: Vec<u8>) -> Result<(), TransportError> {
        self.outbound
            .send(LinkEvent::Response { request_id, payload })
            .await
            .map_err(|_| {
                debug!(peer = %self.peer, request_id, "respond failed, link already closed");
                TransportError::Closed
            })
    }

    /// Send a raw (non-JSON) data frame, used for file chunk streaming.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the link has torn down.
    pub async fn send_raw(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.outbound
            .send(LinkEvent::Data { payload })
            .await
            .map_err(|_| {
                debug!(peer = %self.peer, "send_raw failed, link already closed");
                TransportError::Closed
            })
    }

    /// Await the next event for this end of the link. Returns `None` only
    /// after a [`LinkEvent::Closed`] has already been delivered once.
    pub async fn next_event(&self) -> Option<LinkEvent> {
        let mut guard = self.inbound.lock().await;
        match guard.recv().await {
            Some(event) => Some(event),
            None => {
                if self
                    .closed_emitted
                    .swap(true, std::sync::atomic::Ordering::SeqCst)
                {
                    None
                } else {
                    *self.status.write().await = LinkStatus::Closed;
                    Some(LinkEvent::Closed)
                }
            }
        }
    }

    /// Tear down the link. Idempotent.
    pub async fn close(&self) {
        *self.status.write().await = LinkStatus::Closed;
    }
}

/// Abstracts the mesh overlay transport: identities, destinations,
/// announces, and reliable links. Out of scope per spec.md §1 — this is
/// the contract the session engine consumes, not an implementation of a
/// real mesh protocol.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// This node's own identity.
    fn local_identity(&self) -> Identity;

    /// Per-frame payload ceiling raw sends should respect.
    fn max_payload_size(&self) -> usize {
        DEFAULT_MAX_PAYLOAD_SIZE
    }

    /// Broadcast an announce on `aspect` carrying `app_data`.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if the underlying send fails.
    async fn announce(&self, aspect: &str, app_data: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribe to announces visible on `aspect`. Real adapters filter by
    /// aspect at this layer; callers (`DiscoveryListener`) re-check the
    /// destination's full aspect set regardless, per spec.md §4.1 step 1.
    fn listen_for_announces(&self, aspect: &str) -> broadcast::Receiver<AnnounceEvent>;

    /// Register as a link acceptor on `aspect` (server role). Each inbound
    /// connection attempt yields one [`Link`], already `Active`.
    fn listen_for_links(&self, aspect: &str) -> mpsc::Receiver<Link>;

    /// Establish an outbound link to `peer` on `aspect` (client role),
    /// bounded by `timeout`.
    ///
    /// # Errors
    /// Returns [`TransportError::Unreachable`] if no listener is registered,
    /// or [`TransportError::EstablishTimeout`] if the link does not reach
    /// `Active` in time.
    async fn connect(
        &self,
        peer: Identity,
        aspect: &str,
        timeout: Duration,
    ) -> Result<Link, TransportError>;
}
