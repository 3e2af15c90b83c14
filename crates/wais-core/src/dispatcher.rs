//! `RequestDispatcher` (server side): one worker per link draining inbound
//! requests, with a dedicated worker per `get` (spec.md §4.3).

use std::sync::Arc;

use tracing::{error, warn};
use wais_files::ServerCatalog;
use wais_transport::{Link, LinkEvent, TransportAdapter};

use crate::error::Error;
use crate::protocol::{PeerInfo, Request, Response};

/// Shared, read-mostly state every accepted link's dispatcher needs.
pub struct ServerContext {
    /// The share directory this server exposes.
    pub catalog: ServerCatalog,
    /// Known peers, for `peer_list` responses.
    pub peer_cache: wais_discovery::PeerCache,
    /// This server's own identity hex, excluded from `peer_list` responses.
    pub self_identity_hex: String,
    /// Per-frame payload ceiling used to size `get` stream chunks.
    pub max_payload_size: usize,
}

/// Accept loop: for every inbound link on `aspect`, spawn a dispatcher
/// worker. Runs until the listener channel closes.
pub async fn accept_loop(transport: Arc<dyn TransportAdapter>, aspect: String, ctx: Arc<ServerContext>) {
    let mut incoming = transport.listen_for_links(&aspect);
    while let Some(link) = incoming.recv().await {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            serve_link(Arc::new(link), ctx).await;
        });
    }
}

/// Drain one link's inbound events until it closes.
async fn serve_link(link: Arc<Link>, ctx: Arc<ServerContext>) {
    loop {
        match link.next_event().await {
            Some(LinkEvent::Request { request_id, payload }) => match serde_json::from_slice::<Request>(&payload) {
                Ok(Request::Get { filename }) => {
                    let link = link.clone();
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        handle_get(&link, request_id, filename, &ctx).await;
                    });
                }
                Ok(request) => {
                    let response = handle_immediate(request, &ctx);
                    respond(&link, request_id, &response).await;
                }
                Err(_) => {
                    respond(&link, request_id, &Response::error("Invalid JSON request")).await;
                }
            },
            Some(LinkEvent::Data { .. } | LinkEvent::Response { .. }) => {
                // Servers never receive these; ignore defensively.
            }
            Some(LinkEvent::Closed) | None => break,
        }
    }
}

fn handle_immediate(request: Request, ctx: &ServerContext) -> Response {
    match request {
        Request::List => match ctx.catalog.list() {
            Ok(files) => Response::ok_files(files),
            Err(err) => Error::from(err).into_response(),
        },
        Request::Search { query } => match ctx.catalog.search(&query) {
            Ok(results) => Response::ok_results(results),
            Err(err) => Error::from(err).into_response(),
        },
        Request::PeerList => {
            let peers: Vec<PeerInfo> = ctx
                .peer_cache
                .snapshot_excluding(&ctx.self_identity_hex)
                .into_iter()
                .map(PeerInfo::from)
                .collect();
            Response::ok_peers(peers)
        }
        Request::Get { .. } => {
            unreachable!("Get is dispatched to handle_get before reaching handle_immediate")
        }
    }
}

async fn handle_get(link: &Arc<Link>, request_id: u64, filename: String, ctx: &ServerContext) {
    let prepared = match wais_files::sender::prepare(&ctx.catalog, &filename) {
        Ok(prepared) => prepared,
        Err(err) => {
            respond(link, request_id, &Error::from(err).into_response()).await;
            return;
        }
    };

    let meta = Response::file_meta(
        filename.clone(),
        prepared.wire_size,
        prepared.original_size,
        prepared.compressed,
        prepared.sha256.clone(),
    );
    respond(link, request_id, &meta).await;

    wais_files::sender::stream(link, &prepared, ctx.max_payload_size).await;
}

async fn respond(link: &Link, request_id: u64, response: &Response) {
    let payload = match serde_json::to_vec(response) {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, "failed to serialize response");
            return;
        }
    };
    if link.respond(request_id, payload).await.is_err() {
        warn!("link closed before response could be sent");
    }
}
