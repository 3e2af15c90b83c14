//! Announce-driven peer discovery for Akita WAIS: the periodic
//! [`announce::AnnounceEngine`], the [`listener`] that feeds a
//! [`peer_cache::PeerCache`] from observed announces, and the cache itself.

pub mod announce;
pub mod error;
pub mod listener;
pub mod peer_cache;

pub use announce::{AnnounceEngine, MAX_ANNOUNCE_SIZE, PROTOCOL_VERSION, build_app_data};
pub use error::DiscoveryError;
pub use listener::{DISCOVERY_ASPECT, SERVICE_ASPECT};
pub use peer_cache::{PeerCache, PeerRecord};
