//! End-to-end coverage of the seed scenarios in spec.md §8, driving a real
//! server dispatcher and client link client over a [`MockNetwork`].

use std::sync::Arc;
use std::time::Duration;

use wais_core::dispatcher::ServerContext;
use wais_core::protocol::{Request, SERVICE_ASPECT};
use wais_core::{LinkClient, accept_loop};
use wais_discovery::PeerCache;
use wais_files::ServerCatalog;
use wais_transport::{Identity, MockNetwork, TransportAdapter};

fn spawn_server(network: &MockNetwork, data_dir: &std::path::Path) -> (Identity, tokio::task::JoinHandle<()>) {
    let identity = Identity::random();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));
    let catalog = ServerCatalog::open(data_dir).unwrap();
    let ctx = Arc::new(ServerContext {
        catalog,
        peer_cache: PeerCache::new(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });
    let handle = tokio::spawn(accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));
    (identity, handle)
}

fn client_on(network: &MockNetwork) -> Arc<dyn TransportAdapter> {
    Arc::new(network.join())
}

#[tokio::test]
async fn scenario_1_list_hides_dotfiles() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
    std::fs::write(dir.path().join("b.md"), b"y").unwrap();
    std::fs::write(dir.path().join(".hidden"), b"z").unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client_transport = client_on(&network);
    let client = LinkClient::new(client_transport, SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client.request(Request::List, work_dir.path()).await;
    assert_eq!(response.status, "ok");
    let mut files = response.files.unwrap();
    files.sort();
    assert_eq!(files, vec!["a.txt", "b.md"]);
}

#[tokio::test]
async fn scenario_2_search_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
    std::fs::write(dir.path().join("b.md"), b"y").unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Search { query: ".MD".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.results.unwrap(), vec!["b.md"]);
}

#[tokio::test]
async fn scenario_3_get_roundtrips_small_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "a.txt".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "ok");
    assert_eq!(std::fs::read(work_dir.path().join("a.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn scenario_4_traversal_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "../etc/passwd".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "error");
    assert_eq!(response.message.unwrap(), "Access denied");
    assert!(!work_dir.path().join("passwd").exists());
}

#[tokio::test]
async fn scenario_5_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Get { filename: "missing".to_string() }, work_dir.path())
        .await;
    assert_eq!(response.status, "error");
    assert_eq!(response.message.unwrap(), "File not found");
}

#[tokio::test]
async fn scenario_6_peer_list_excludes_self_and_includes_other_server() {
    let network = MockNetwork::new();
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let server_a_identity = Identity::random();
    let server_b_identity = Identity::random();

    // Each server's cache is pre-populated as if DiscoveryListener had
    // already processed the other's announce and its own self-announce.
    let cache_a = PeerCache::new();
    cache_a.upsert(wais_discovery::PeerRecord {
        identity_hex: server_b_identity.to_hex(),
        name: "server-b".to_string(),
        description: String::new(),
        capabilities: Default::default(),
        last_seen_unix_sec: 1,
        extra: serde_json::Map::new(),
    });

    let transport_a: Arc<dyn TransportAdapter> = Arc::new(network.join_as(server_a_identity));
    let ctx_a = Arc::new(ServerContext {
        catalog: ServerCatalog::open(dir_a.path()).unwrap(),
        peer_cache: cache_a,
        self_identity_hex: server_a_identity.to_hex(),
        max_payload_size: transport_a.max_payload_size(),
    });
    let _server_a = tokio::spawn(accept_loop(transport_a, SERVICE_ASPECT.to_string(), ctx_a));

    let _transport_b: Arc<dyn TransportAdapter> = Arc::new(network.join_as(server_b_identity));
    let _catalog_b = ServerCatalog::open(dir_b.path()).unwrap();

    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_a_identity).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client.request(Request::PeerList, work_dir.path()).await;
    let peers = response.peers.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].hash, server_b_identity.to_hex());
    assert!(peers.iter().all(|p| p.hash != server_a_identity.to_hex()));
}

#[tokio::test]
async fn get_of_empty_query_search_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

    let network = MockNetwork::new();
    let (server_id, _server) = spawn_server(&network, dir.path());
    let client = LinkClient::new(client_on(&network), SERVICE_ASPECT.to_string(), Duration::from_secs(2));
    assert!(client.establish(server_id).await);

    let work_dir = tempfile::tempdir().unwrap();
    let response = client
        .request(Request::Search { query: String::new() }, work_dir.path())
        .await;
    assert!(response.results.unwrap().is_empty());
}
