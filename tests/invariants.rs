//! Direct coverage of the universal invariants in spec.md §8 that span
//! more than one crate.

use std::sync::Arc;
use std::time::Duration;

use wais_core::dispatcher::ServerContext;
use wais_core::protocol::{Request, Response, SERVICE_ASPECT};
use wais_core::{LinkClient, accept_loop};
use wais_discovery::PeerCache;
use wais_files::ServerCatalog;
use wais_transport::{Identity, LinkEvent, MockNetwork, TransportAdapter};

#[tokio::test]
async fn p4_round_trip_integrity_for_compressible_file() {
    let dir = tempfile::tempdir().unwrap();
    let contents = vec![b'x'; 8192];
    std::fs::write(dir.path().join("big.txt"), &contents).unwrap();

    let network = MockNetwork::new();
    let identity = Identity::random();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));
    let ctx = Arc::new(ServerContext {
        catalog: ServerCatalog::open(dir.path()).unwrap(),
        peer_cache: PeerCache::new(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });
    tokio::spawn(accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));

    let client = LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "big.txt".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "ok");
    assert_eq!(std::fs::read(work_dir.path().join("big.txt")).unwrap(), contents);
}

#[tokio::test]
async fn p5_tampered_digest_is_rejected_and_file_not_committed() {
    // A hand-rolled "server" that deliberately lies about the digest,
    // standing in for spec.md's "test double" (§8 P5).
    let network = MockNetwork::new();
    let server_identity = Identity::random();
    let server_transport = network.join_as(server_identity);
    let mut incoming = server_transport.listen_for_links(SERVICE_ASPECT);

    tokio::spawn(async move {
        let link = incoming.recv().await.unwrap();
        if let Some(LinkEvent::Request { request_id, .. }) = link.next_event().await {
            let meta = Response::file_meta("f.bin", 5, 5, false, "0".repeat(64));
            link.respond(request_id, serde_json::to_vec(&meta).unwrap()).await.unwrap();
            link.send_raw(b"hello".to_vec()).await.unwrap();
        }
    });

    let client = LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "f.bin".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "error");
    assert!(!work_dir.path().join("f.bin").exists());
}

#[tokio::test]
async fn p8_timeout_discards_streamed_partial_file() {
    // A server that advertises a large (above-RAM, streamed-to-disk)
    // transfer, sends a partial chunk, then goes silent well past the
    // client's request timeout without closing the link.
    let network = MockNetwork::new();
    let server_identity = Identity::random();
    let server_transport = network.join_as(server_identity);
    let mut incoming = server_transport.listen_for_links(SERVICE_ASPECT);

    tokio::spawn(async move {
        let link = incoming.recv().await.unwrap();
        if let Some(LinkEvent::Request { request_id, .. }) = link.next_event().await {
            let big_size = wais_files::MAX_TRANSFER_RAM + 1;
            let meta = Response::file_meta("big.bin", big_size, big_size, false, "0".repeat(64));
            link.respond(request_id, serde_json::to_vec(&meta).unwrap()).await.unwrap();
            link.send_raw(vec![0u8; 16]).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    let client = LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_millis(100));
    assert!(client.establish(server_identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "big.bin".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "error");
    assert_eq!(response.message.unwrap(), "Timeout");

    let entries: Vec<_> = std::fs::read_dir(work_dir.path()).unwrap().collect();
    assert!(entries.is_empty(), "expected no partial file left behind after timeout, found {entries:?}");
}

#[tokio::test]
async fn p6_incompressible_small_file_is_sent_uncompressed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tiny.bin"), b"ab").unwrap();

    let network = MockNetwork::new();
    let identity = Identity::random();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));
    let ctx = Arc::new(ServerContext {
        catalog: ServerCatalog::open(dir.path()).unwrap(),
        peer_cache: PeerCache::new(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });
    tokio::spawn(accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));

    let client = LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "tiny.bin".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "ok");
    assert_eq!(std::fs::read(work_dir.path().join("tiny.bin")).unwrap(), b"ab");
}

#[tokio::test]
async fn p7_second_get_on_same_link_waits_for_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"aaa").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"bbb").unwrap();

    let network = MockNetwork::new();
    let identity = Identity::random();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));
    let ctx = Arc::new(ServerContext {
        catalog: ServerCatalog::open(dir.path()).unwrap(),
        peer_cache: PeerCache::new(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });
    tokio::spawn(accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));

    let client = Arc::new(LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_secs(2)));
    assert!(client.establish(identity).await);

    let work_dir_a = tempfile::tempdir().unwrap();
    let work_dir_b = tempfile::tempdir().unwrap();

    let client_a = client.clone();
    let dir_a = work_dir_a.path().to_path_buf();
    let task_a = tokio::spawn(async move {
        client_a.request(Request::Get { filename: "a.txt".to_string() }, &dir_a).await
    });
    let client_b = client.clone();
    let dir_b = work_dir_b.path().to_path_buf();
    let task_b = tokio::spawn(async move {
        client_b.request(Request::Get { filename: "b.txt".to_string() }, &dir_b).await
    });

    let (response_a, response_b) = tokio::join!(task_a, task_b);
    assert_eq!(response_a.unwrap().status, "ok");
    assert_eq!(response_b.unwrap().status, "ok");
    assert_eq!(std::fs::read(work_dir_a.path().join("a.txt")).unwrap(), b"aaa");
    assert_eq!(std::fs::read(work_dir_b.path().join("b.txt")).unwrap(), b"bbb");
}

#[tokio::test]
async fn p9_identical_list_calls_return_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

    let network = MockNetwork::new();
    let identity = Identity::random();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));
    let ctx = Arc::new(ServerContext {
        catalog: ServerCatalog::open(dir.path()).unwrap(),
        peer_cache: PeerCache::new(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });
    tokio::spawn(accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));

    let client = LinkClient::new(Arc::new(network.join()), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let first = client.request(Request::List, work_dir.path()).await;
    let second = client.request(Request::List, work_dir.path()).await;
    assert_eq!(first.files, second.files);
}
