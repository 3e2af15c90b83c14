//! Akita WAIS CLI: `server` advertises a share directory over the mesh
//! overlay; `client` discovers servers and pulls files from them.
//!
//! The transport backing both subcommands is [`wais_transport::MockTransport`]
//! joined to a process-local [`wais_transport::MockNetwork`] — this
//! workspace does not ship a real mesh backend (spec.md §1 "out of scope").
//! A real deployment would construct its [`wais_transport::TransportAdapter`]
//! here instead; everything past that point (dispatcher, link client,
//! discovery) is backend-agnostic.

mod config;
mod identity;
mod progress;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::Config;
use progress::{TransferProgress, format_bytes};
use wais_core::dispatcher::ServerContext;
use wais_core::protocol::{Request, SERVICE_ASPECT};
use wais_discovery::{AnnounceEngine, PeerCache, build_app_data, listener};
use wais_files::ServerCatalog;
use wais_transport::{MockNetwork, TransportAdapter};

/// Akita WAIS: decentralized file-sharing over a mesh overlay.
#[derive(Parser)]
#[command(name = "akita-wais")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path; defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Advertise a share directory and answer requests from clients.
    Server {
        /// Disable periodic announcing (still answers inbound links).
        #[arg(long)]
        no_announce: bool,
    },
    /// Discover servers and interactively pull files from one.
    Client,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.to_lowercase())
        .init();

    let result = match cli.command {
        Commands::Server { no_announce } => run_server(&config, no_announce).await,
        Commands::Client => run_client(&config).await,
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_server(config: &Config, no_announce: bool) -> anyhow::Result<()> {
    let identity = identity::load_or_create(&config.identity.server_identity_path)?;
    tracing::info!(identity = %identity, "server identity loaded");

    // A fresh, unjoined network: see the module doc above. Swap this for a
    // real `TransportAdapter` to actually reach other processes.
    let network = MockNetwork::new();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));

    let catalog = ServerCatalog::open(config.server.data_dir.clone())?;
    tracing::info!(data_dir = %catalog.root().display(), "serving share directory");

    let peer_cache = PeerCache::load(&config.client.server_cache_path);
    listener::spawn(transport.clone(), config.discovery.aspect.clone(), identity, peer_cache.clone());

    let announce_engine = if no_announce {
        None
    } else {
        let name = config.server.server_info.name.clone();
        let desc = config.server.server_info.description.clone();
        Some(AnnounceEngine::start(
            transport.clone(),
            SERVICE_ASPECT.to_string(),
            Duration::from_secs(config.server.announce_interval_sec),
            move || build_app_data(&name, &desc, &["zlib", "sha256"]),
        ))
    };

    let ctx = Arc::new(ServerContext {
        catalog,
        peer_cache: peer_cache.clone(),
        self_identity_hex: identity.to_hex(),
        max_payload_size: transport.max_payload_size(),
    });

    let accept = tokio::spawn(wais_core::accept_loop(transport, SERVICE_ASPECT.to_string(), ctx));

    println!("Akita WAIS server running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    if let Some(engine) = announce_engine {
        engine.stop().await;
    }
    accept.abort();
    peer_cache.save(&config.client.server_cache_path)?;

    Ok(())
}

async fn run_client(config: &Config) -> anyhow::Result<()> {
    let identity = identity::load_or_create(&config.identity.client_identity_path)?;
    tracing::info!(identity = %identity, "client identity loaded");

    let network = MockNetwork::new();
    let transport: Arc<dyn TransportAdapter> = Arc::new(network.join_as(identity));

    let peer_cache = PeerCache::load(&config.client.server_cache_path);
    listener::spawn(transport.clone(), config.discovery.aspect.clone(), identity, peer_cache.clone());

    println!("Discovering servers (Ctrl+C to quit)...");
    interactive_menu(&transport, &peer_cache, config).await;

    peer_cache.save(&config.client.server_cache_path)?;
    Ok(())
}

async fn interactive_menu(transport: &Arc<dyn TransportAdapter>, peer_cache: &PeerCache, config: &Config) {
    let timeout = Duration::from_secs(config.client.request_timeout_sec);
    loop {
        let mut peers = peer_cache.snapshot_excluding("");
        peers.sort_by_key(|peer| std::cmp::Reverse(peer.last_seen_unix_sec));
        if peers.is_empty() {
            println!("No servers discovered yet. Waiting a moment and retrying...");
            tokio::time::sleep(Duration::from_secs(2)).await;
            continue;
        }

        println!("\nKnown servers:");
        for (i, peer) in peers.iter().enumerate() {
            println!("  [{i}] {} ({}) - {}", peer.name, peer.identity_hex, peer.description);
        }
        println!("  [q] quit");

        let Some(choice) = prompt("Select a server: ") else { break };
        if choice.trim() == "q" {
            break;
        }
        let Ok(index) = choice.trim().parse::<usize>() else {
            println!("Invalid selection.");
            continue;
        };
        let Some(peer) = peers.get(index) else {
            println!("Invalid selection.");
            continue;
        };
        let Ok(peer_identity) = wais_transport::Identity::from_hex(&peer.identity_hex) else {
            println!("Corrupt peer record.");
            continue;
        };

        let client = wais_core::LinkClient::new(transport.clone(), SERVICE_ASPECT.to_string(), timeout);
        if !client.establish(peer_identity).await {
            println!("Could not establish a link to {}.", peer.name);
            continue;
        }

        session_loop(&client).await;
        client.close().await;
    }
}

async fn session_loop(client: &wais_core::LinkClient) {
    let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    loop {
        println!("\n[1] list  [2] search  [3] get  [4] peer_list  [5] disconnect");
        let Some(choice) = prompt("Choose an action: ") else { return };
        let request = match choice.trim() {
            "1" => Request::List,
            "2" => {
                let Some(query) = prompt("Query: ") else { return };
                Request::Search { query: query.trim().to_string() }
            }
            "3" => {
                let Some(filename) = prompt("Filename: ") else { return };
                Request::Get { filename: filename.trim().to_string() }
            }
            "4" => Request::PeerList,
            "5" => return,
            _ => {
                println!("Invalid choice.");
                continue;
            }
        };

        let is_get = matches!(request, Request::Get { .. });
        let progress = is_get.then(|| TransferProgress::new(0, "transfer"));

        let response = client.request(request, &work_dir).await;
        if let Some(progress) = progress {
            progress.finish_with_message(response.message.clone().unwrap_or_default());
        }
        print_response(&response);
    }
}

fn print_response(response: &wais_core::protocol::Response) {
    if let Some(files) = &response.files {
        println!("Files: {files:?}");
    }
    if let Some(results) = &response.results {
        println!("Results: {results:?}");
    }
    if let Some(peers) = &response.peers {
        for peer in peers {
            println!("  {} ({}) last seen {}", peer.name, peer.hash, peer.last_seen);
        }
    }
    if let Some(size) = response.size {
        println!("Receiving {} ({})", response.filename.clone().unwrap_or_default(), format_bytes(size));
    }
    if let Some(message) = &response.message {
        println!("{}: {message}", response.status);
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    if line.is_empty() { None } else { Some(line) }
}
