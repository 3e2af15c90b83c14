//! Protocol codec: the JSON request/response schema and its constants
//! (spec.md §4.7, §6).

use serde::{Deserialize, Serialize};

pub use wais_discovery::{DISCOVERY_ASPECT, SERVICE_ASPECT};

/// Status literal for a successful response.
pub const STATUS_OK: &str = "ok";
/// Status literal for an error response.
pub const STATUS_ERROR: &str = "error";
/// Status literal for the phase-1 `get` response.
pub const STATUS_FILE_META: &str = "file_meta";

/// A decoded client request (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Enumerate the server's share directory.
    List,
    /// Fetch a file by name.
    Get {
        /// Name as it appeared in the server's `list` response.
        filename: String,
    },
    /// Case-insensitive substring search over filenames.
    Search {
        /// The search substring. Empty returns no results.
        query: String,
    },
    /// Snapshot of the server's known peers.
    PeerList,
}

/// A peer entry as it appears in a `peer_list` response (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Advertised display name.
    pub name: String,
    /// Advertised description.
    pub description: String,
    /// Lowercase hex peer identity.
    pub hash: String,
    /// Wall-clock seconds since epoch the peer was last seen.
    pub last_seen: i64,
}

impl From<wais_discovery::PeerRecord> for PeerInfo {
    fn from(record: wais_discovery::PeerRecord) -> Self {
        Self {
            name: record.name,
            description: record.description,
            hash: record.identity_hex,
            last_seen: record.last_seen_unix_sec,
        }
    }
}

/// A response frame (spec.md §3, §6). One struct covers all three statuses;
/// which optional fields are populated depends on `status` and, for `ok`,
/// on which action produced it. Extra/absent fields round-trip as `None`
/// per the forward-compatibility rule in spec.md §4.7.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Response {
    /// One of [`STATUS_OK`], [`STATUS_ERROR`], [`STATUS_FILE_META`].
    pub status: String,
    /// Present on `error` responses, and on the `file_meta` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present on a `list` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Present on a `search` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
    /// Present on a `peer_list` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<PeerInfo>>,
    /// Present on a `file_meta` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Wire size in bytes (after optional compression). `file_meta` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Size of the original, uncompressed file. `file_meta` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    /// Whether `size` bytes on the wire are deflate-compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
    /// Hex SHA-256 of the original file. `file_meta` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl Response {
    /// `{"status":"ok","files":[...]}`
    #[must_use]
    pub fn ok_files(files: Vec<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            files: Some(files),
            ..Default::default()
        }
    }

    /// `{"status":"ok","results":[...]}`
    #[must_use]
    pub fn ok_results(results: Vec<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            results: Some(results),
            ..Default::default()
        }
    }

    /// `{"status":"ok","peers":[...]}`
    #[must_use]
    pub fn ok_peers(peers: Vec<PeerInfo>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            peers: Some(peers),
            ..Default::default()
        }
    }

    /// `{"status":"ok","message":"..."}`
    #[must_use]
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// `{"status":"error","message":"..."}`
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// The phase-1 `get` response (spec.md §4.4 step 5).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn file_meta(
        filename: impl Into<String>,
        size: u64,
        original_size: u64,
        compressed: bool,
        sha256: impl Into<String>,
    ) -> Self {
        Self {
            status: STATUS_FILE_META.to_string(),
            message: Some("File data follows".to_string()),
            filename: Some(filename.into()),
            size: Some(size),
            original_size: Some(original_size),
            compressed: Some(compressed),
            sha256: Some(sha256.into()),
            ..Default::default()
        }
    }

    /// Whether this response is the non-terminal `file_meta` phase-1 frame
    /// (spec.md §4.5: any other status is terminal).
    #[must_use]
    pub fn is_file_meta(&self) -> bool {
        self.status == STATUS_FILE_META
    }
}
