//! Deflate compression used opportunistically by [`crate::sender`].
//!
//! Mirrors spec.md §4.4 step 3: compress at level 6, keep the compressed
//! bytes only if they are strictly smaller than the original.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

/// Deflate `data` at level 6. Returns `None` if the compressed form is not
/// strictly smaller than `data` (spec.md §8 P6).
pub fn compress_if_smaller(data: &[u8]) -> std::io::Result<Option<Vec<u8>>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(if compressed.len() < data.len() {
        Some(compressed)
    } else {
        None
    })
}

/// Inflate a deflate-compressed buffer.
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
