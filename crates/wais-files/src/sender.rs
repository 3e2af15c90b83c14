//! `FileSender`: resolve → stat → prepare → digest → stream (spec.md §4.4).
//!
//! [`prepare`] does everything up through computing the digest and deciding
//! on compression; it never touches the link. [`stream`] does the actual
//! chunked send and is the only part that talks to a [`wais_transport::Link`],
//! so callers can emit the `file_meta` response (a protocol-codec concern)
//! between the two calls.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use wais_transport::{Link, LinkStatus};

use crate::catalog::ServerCatalog;
use crate::compress;
use crate::error::CatalogError;
use crate::hash;

/// Files this size or smaller are buffered fully in memory and eligible for
/// compression; larger files stream from disk, uncompressed (spec.md §4.4
/// step 3 and memory discipline).
pub const MAX_TRANSFER_RAM: u64 = 20 * 1024 * 1024;

const INTER_CHUNK_YIELD: Duration = Duration::from_millis(5);

enum Payload {
    Buffered(Vec<u8>),
    Streamed(PathBuf),
}

/// The outcome of [`prepare`]: everything needed to emit a `file_meta`
/// response and then stream the bytes.
pub struct PreparedFile {
    /// Bytes that will actually cross the wire (compressed or original).
    pub wire_size: u64,
    /// Size of the original, uncompressed file.
    pub original_size: u64,
    /// Whether `wire_size` bytes are deflate-compressed.
    pub compressed: bool,
    /// Hex SHA-256 over the **original** uncompressed bytes.
    pub sha256: String,
    payload: Payload,
}

/// Resolve `filename` against `catalog`, read/compress it, and compute its
/// digest. Does not touch the network.
///
/// # Errors
/// [`CatalogError::AccessDenied`] / [`CatalogError::NotFound`] per
/// [`ServerCatalog::resolve`]; [`CatalogError::Io`] on read failure.
pub fn prepare(catalog: &ServerCatalog, filename: &str) -> Result<PreparedFile, CatalogError> {
    let path = catalog.resolve(filename)?;
    let original_size = std::fs::metadata(&path)?.len();

    if original_size <= MAX_TRANSFER_RAM {
        let original = std::fs::read(&path)?;
        let sha256 = hash::hash_bytes(&original);
        match compress::compress_if_smaller(&original) {
            Ok(Some(compressed)) => {
                let wire_size = compressed.len() as u64;
                Ok(PreparedFile {
                    wire_size,
                    original_size,
                    compressed: true,
                    sha256,
                    payload: Payload::Buffered(compressed),
                })
            }
            Ok(None) => {
                let wire_size = original.len() as u64;
                Ok(PreparedFile {
                    wire_size,
                    original_size,
                    compressed: false,
                    sha256,
                    payload: Payload::Buffered(original),
                })
            }
            Err(err) => {
                warn!(%filename, error = %err, "compression failed, sending raw");
                let wire_size = original.len() as u64;
                Ok(PreparedFile {
                    wire_size,
                    original_size,
                    compressed: false,
                    sha256,
                    payload: Payload::Buffered(original),
                })
            }
        }
    } else {
        let file = File::open(&path)?;
        let sha256 = hash::hash_reader(file)?;
        Ok(PreparedFile {
            wire_size: original_size,
            original_size,
            compressed: false,
            sha256,
            payload: Payload::Streamed(path),
        })
    }
}

/// Stream `prepared`'s payload over `link` as raw data frames of
/// `⌊max_payload_size / 2⌋` bytes, yielding briefly between frames. Aborts
/// silently (no error, no further frames) if the link leaves `Active`
/// mid-stream; the receiver's own timeout surfaces the failure.
pub async fn stream(link: &Link, prepared: &PreparedFile, max_payload_size: usize) {
    let chunk_size = (max_payload_size / 2).max(1);
    match &prepared.payload {
        Payload::Buffered(bytes) => {
            for chunk in bytes.chunks(chunk_size) {
                if link.status().await != LinkStatus::Active {
                    return;
                }
                if link.send_raw(chunk.to_vec()).await.is_err() {
                    return;
                }
                tokio::time::sleep(INTER_CHUNK_YIELD).await;
            }
        }
        Payload::Streamed(path) => {
            let Ok(mut file) = File::open(path) else {
                return;
            };
            let mut buf = vec![0u8; chunk_size];
            loop {
                if link.status().await != LinkStatus::Active {
                    return;
                }
                let Ok(n) = file.read(&mut buf) else {
                    return;
                };
                if n == 0 {
                    return;
                }
                if link.send_raw(buf[..n].to_vec()).await.is_err() {
                    return;
                }
                tokio::time::sleep(INTER_CHUNK_YIELD).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_digest_is_over_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let catalog = ServerCatalog::open(dir.path()).unwrap();
        let prepared = prepare(&catalog, "a.txt").unwrap();
        assert_eq!(prepared.original_size, 5);
        assert_eq!(prepared.sha256, hash::hash_bytes(b"hello"));
    }

    #[test]
    fn incompressible_small_file_is_sent_raw() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let catalog = ServerCatalog::open(dir.path()).unwrap();
        let prepared = prepare(&catalog, "a.txt").unwrap();
        assert!(!prepared.compressed);
        assert_eq!(prepared.wire_size, 2);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ServerCatalog::open(dir.path()).unwrap();
        assert!(matches!(prepare(&catalog, "nope"), Err(CatalogError::NotFound)));
    }
}
