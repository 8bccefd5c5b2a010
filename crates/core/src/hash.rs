//! BLAKE3 digests used for content dedup and block checksums

use crate::error::HistoryError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A BLAKE3 digest of some stored bytes (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64 character hex string
    pub fn from_hex(text: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| HistoryError::BrokenStorage(format!("bad content hash {text:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// First eight hex digits, enough to tell blobs apart in logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash::from_bytes(*blake3::hash(data).as_bytes())
}

/// Checksum over a framed record: every part is length-prefixed so that
/// moving bytes between parts changes the digest.
pub fn checksum(parts: &[&[u8]]) -> ContentHash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    ContentHash::from_bytes(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        assert_eq!(hash_bytes(b"hello world"), hash_bytes(b"hello world"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = ContentHash::from_bytes([42; 32]);
        let decoded = ContentHash::from_hex(&original.to_hex()).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(original.short().len(), 8);
    }

    #[test]
    fn test_hex_decoding_rejects_garbage() {
        assert!(ContentHash::from_hex("abc").is_err());
        assert!(ContentHash::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_checksum_depends_on_framing() {
        let joined = checksum(&[b"ab", b"c"]);
        let shifted = checksum(&[b"a", b"bc"]);
        assert_ne!(joined, shifted);
        assert_eq!(joined, checksum(&[b"ab", b"c"]));
    }
}
