//! `FileReceiver`: accumulate raw data frames into a `TransferState`,
//! finalize on byte-count exhaustion (spec.md §4.6).

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::compress;
use crate::error::TransferError;
use crate::sender::MAX_TRANSFER_RAM;

enum Sink {
    /// Whole payload kept in memory; decompressed (if needed) and hashed at
    /// finalize time.
    Buffered(Vec<u8>),
    /// Payload written straight to a temp file as it arrives, hashed
    /// incrementally. Only used above [`MAX_TRANSFER_RAM`], where the
    /// sender guarantees `compressed == false`.
    Streamed { file: std::fs::File, path: PathBuf, hasher: Sha256 },
}

/// Per-link, per-`get` receive-side state (spec.md §3 `TransferState`).
///
/// At most one non-finalized `TransferState` may exist per link (§8 P7);
/// enforcing that is the caller's responsibility ([`wais_core`]'s link
/// client), not this type's.
pub struct TransferState {
    filename: String,
    expected_size: u64,
    received_size: u64,
    compressed: bool,
    sha256_expected: Option<String>,
    sink: Sink,
}

impl TransferState {
    /// Begin receiving a transfer described by a `file_meta` response.
    ///
    /// `work_dir` is where a streamed (above-RAM) transfer's temp file is
    /// created; it should be the same directory the final file lands in so
    /// the eventual rename is atomic.
    ///
    /// # Errors
    /// Returns an I/O error if the streaming temp file cannot be created.
    pub fn begin(
        filename: String,
        expected_size: u64,
        compressed: bool,
        sha256_expected: Option<String>,
        work_dir: &Path,
    ) -> std::io::Result<Self> {
        let sink = if expected_size > MAX_TRANSFER_RAM {
            let path = work_dir.join(format!(".{filename}.partial"));
            let file = std::fs::File::create(&path)?;
            Sink::Streamed {
                file,
                path,
                hasher: Sha256::new(),
            }
        } else {
            Sink::Buffered(Vec::with_capacity(expected_size as usize))
        };
        Ok(Self {
            filename,
            expected_size,
            received_size: 0,
            compressed,
            sha256_expected,
            sink,
        })
    }

    /// Append a raw data frame.
    ///
    /// # Errors
    /// Returns an I/O error if the streaming sink's temp file write fails.
    pub fn push_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.received_size += data.len() as u64;
        match &mut self.sink {
            Sink::Buffered(buf) => buf.extend_from_slice(data),
            Sink::Streamed { file, hasher, .. } => {
                file.write_all(data)?;
                hasher.update(data);
            }
        }
        Ok(())
    }

    /// Whether enough bytes have arrived to finalize.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received_size >= self.expected_size
    }

    /// Bytes received so far.
    #[must_use]
    pub fn received_size(&self) -> u64 {
        self.received_size
    }

    /// The name this transfer will be committed under.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Decompress (if needed), verify the digest, and commit the file under
    /// `dest_dir`. Consumes `self`; on any error the temp file (if any) is
    /// removed and no final file is written.
    ///
    /// # Errors
    /// [`TransferError::DecompressionFailed`], [`TransferError::IntegrityMismatch`],
    /// or an I/O error writing the final file.
    pub fn finalize(self, dest_dir: &Path) -> Result<PathBuf, TransferError> {
        let final_path = dest_dir.join(&self.filename);
        match self.sink {
            Sink::Buffered(buf) => {
                let plain = if self.compressed {
                    compress::decompress(&buf).map_err(|_| TransferError::DecompressionFailed)?
                } else {
                    buf
                };
                if let Some(expected) = &self.sha256_expected {
                    let actual = crate::hash::hash_bytes(&plain);
                    if &actual != expected {
                        return Err(TransferError::IntegrityMismatch);
                    }
                }
                write_atomically(dest_dir, &self.filename, &plain)?;
                Ok(final_path)
            }
            Sink::Streamed { mut file, path, hasher } => {
                file.flush()?;
                drop(file);
                if let Some(expected) = &self.sha256_expected {
                    let actual = hex::encode(hasher.finalize());
                    if &actual != expected {
                        let _ = std::fs::remove_file(&path);
                        return Err(TransferError::IntegrityMismatch);
                    }
                }
                std::fs::rename(&path, &final_path)?;
                Ok(final_path)
            }
        }
    }

    /// Discard this transfer without committing anything (link closed or
    /// timed out mid-transfer; spec.md §8 P8).
    pub fn discard(self) {
        if let Sink::Streamed { path, .. } = self.sink {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn write_atomically(dest_dir: &Path, filename: &str, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = dest_dir.join(format!(".{filename}.partial"));
    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(data)?;
        tmp.flush()?;
    }
    std::fs::rename(&tmp_path, dest_dir.join(filename))?;
    Ok(())
}
