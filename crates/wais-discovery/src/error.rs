//! Discovery-layer error types (spec.md §7 class 3, peer-cache I/O).

use thiserror::Error;

/// Errors surfaced by the peer cache and the announce/listener tasks.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Reading or writing the on-disk peer cache failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A peer-cache file or announce app-data blob did not parse as JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Broadcasting or receiving an announce failed at the transport layer.
    #[error(transparent)]
    Transport(#[from] wais_transport::TransportError),
}
