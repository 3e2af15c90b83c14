//! Peer identity: an opaque key the mesh transport assigns and keeps stable
//! across restarts once persisted by the caller.

use std::fmt;

/// Size in bytes of an [`Identity`]. 16 bytes (128 bits) matches the
/// destination-hash length real mesh overlays such as Reticulum use.
pub const IDENTITY_SIZE: usize = 16;

/// An opaque peer identity.
///
/// Identities are produced by the transport (real or mock); callers never
/// construct meaning from the bytes themselves, only compare and hex-encode
/// them (`identityHex` in [`spec.md`]'s `PeerRecord`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(pub [u8; IDENTITY_SIZE]);

impl Identity {
    /// Generate a random identity (used by [`crate::mock::MockTransport`]
    /// and by tests standing in for `identity.load_or_create`).
    #[must_use]
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; IDENTITY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Lowercase hex encoding, matching `PeerRecord.identityHex`.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a lowercase (or any-case) hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; IDENTITY_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = Identity::random();
        let hex = id.to_hex();
        assert_eq!(Identity::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn random_identities_differ() {
        assert_ne!(Identity::random(), Identity::random());
    }
}
