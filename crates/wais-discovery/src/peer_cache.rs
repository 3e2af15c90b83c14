//! `PeerCache`: a thread-safe, persisted map of known peers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DiscoveryError;

/// On-disk format version. Bump when the shape of [`PeerRecord`] changes in
/// a way a future reader needs to know about (design.md §9 "peer cache
/// format").
const CACHE_FORMAT_VERSION: u32 = 1;

/// A peer as advertised by its most recent announce (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRecord {
    /// Lowercase hex peer identity; the cache key.
    #[serde(rename = "identityHex")]
    pub identity_hex: String,
    /// Advertised display name.
    #[serde(default)]
    pub name: String,
    /// Advertised description.
    #[serde(default)]
    pub description: String,
    /// Advertised capability tags (e.g. `"zlib"`, `"sha256"`).
    #[serde(default)]
    pub capabilities: HashSet<String>,
    /// Wall-clock seconds since epoch when this record was last refreshed.
    #[serde(rename = "lastSeenUnixSec")]
    pub last_seen_unix_sec: i64,
    /// Fields this version doesn't understand, preserved byte-for-byte so a
    /// newer writer sharing this file doesn't lose them on our re-save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    peers: Vec<PeerRecord>,
}

/// Thread-safe peer index, persisted to a JSON file across restarts.
#[derive(Clone)]
pub struct PeerCache {
    peers: std::sync::Arc<DashMap<String, PeerRecord>>,
}

impl PeerCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// Load from `path`. A missing or corrupt file is non-fatal: logs a
    /// warning and starts empty (spec.md §4.1).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let cache = Self::new();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return cache,
            Err(err) => {
                let err = DiscoveryError::from(err);
                warn!(path = %path.display(), error = %err, "failed to read peer cache, starting empty");
                return cache;
            }
        };
        match serde_json::from_str::<CacheFile>(&contents) {
            Ok(file) => {
                for peer in file.peers {
                    cache.peers.insert(peer.identity_hex.clone(), peer);
                }
            }
            Err(err) => {
                let err = DiscoveryError::from(err);
                warn!(path = %path.display(), error = %err, "peer cache file is corrupt, starting empty");
            }
        }
        cache
    }

    /// Persist the current contents to `path`.
    ///
    /// # Errors
    /// Returns [`DiscoveryError`] on I/O or serialization failure.
    pub fn save(&self, path: &Path) -> Result<(), DiscoveryError> {
        let peers: Vec<PeerRecord> = self.peers.iter().map(|entry| entry.value().clone()).collect();
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            peers,
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Insert or refresh a peer record. `last_seen_unix_sec` is clamped to
    /// be monotonically non-decreasing relative to the existing record
    /// (spec.md §8 P2): an announce that appears to arrive "in the past"
    /// still advances the stored timestamp to the current value, it just
    /// never moves it backwards.
    pub fn upsert(&self, mut record: PeerRecord) {
        self.peers
            .entry(record.identity_hex.clone())
            .and_modify(|existing| {
                record.last_seen_unix_sec = record.last_seen_unix_sec.max(existing.last_seen_unix_sec);
                *existing = record.clone();
            })
            .or_insert(record);
    }

    /// Snapshot of all known peers, excluding `self_identity_hex` if present
    /// (belt-and-suspenders alongside the listener's own self-check).
    #[must_use]
    pub fn snapshot_excluding(&self, self_identity_hex: &str) -> Vec<PeerRecord> {
        self.peers
            .iter()
            .filter(|entry| entry.key() != self_identity_hex)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of known peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerCache {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
