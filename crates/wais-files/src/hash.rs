//! SHA-256 digesting, buffered and streaming.

use std::io::Read;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory buffer.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of a readable stream, read in fixed-size chunks so
/// callers never buffer the whole file (spec.md §4.4 memory discipline).
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    const CHUNK: usize = 64 * 1024;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha256("hello")
        assert_eq!(
            hash_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn reader_matches_bytes() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        assert_eq!(hash_bytes(&data), hash_reader(&data[..]).unwrap());
    }
}
