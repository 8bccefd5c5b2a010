//! Content-addressed blob storage for file contents
//!
//! Blobs are keyed by small integer ids handed out in increasing order.
//! Storing bytes that are already present returns the existing id, so the
//! same content recorded twice occupies one blob.

use crate::error::HistoryError;
use crate::hash::{hash_bytes, ContentHash};
use crate::store::atomic_write;
use crate::Result;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key of a blob inside a [`ContentStorage`]
pub type StoredId = u64;

/// Blobs larger than this are compressed with zstd
const COMPRESSION_THRESHOLD: usize = 4 * 1024;

/// Where stored contents live
pub trait ContentStorage: Send + Sync {
    /// Store bytes and return their id
    fn store(&self, bytes: &[u8]) -> Result<StoredId>;

    /// Load the bytes stored under `id`
    fn load(&self, id: StoredId) -> Result<Vec<u8>>;

    /// Forget a blob. Removing an unknown id is not an error.
    fn remove(&self, id: StoredId) -> Result<()>;

    /// Ids of every blob currently held
    fn ids(&self) -> Vec<StoredId>;
}

/// Blob header format (version 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeaderV1 {
    /// Flags: bit0=compressed, bit1-7=reserved
    pub flags: u8,
    /// Original size (before compression)
    pub orig_len: u64,
    /// Stored size (after compression, if compressed)
    pub stored_len: u64,
    /// Digest of the original bytes
    pub hash: ContentHash,
}

impl BlobHeaderV1 {
    const MAGIC: [u8; 4] = *b"LHB1";
    const FLAG_COMPRESSED: u8 = 0b0000_0001;
    /// magic(4) + flags(1) + orig_len(8) + stored_len(8) + hash(32)
    pub const LEN: usize = 53;

    pub fn new(orig_len: u64, stored_len: u64, compressed: bool, hash: ContentHash) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            flags,
            orig_len,
            stored_len,
            hash,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&Self::MAGIC);
        out[4] = self.flags;
        out[5..13].copy_from_slice(&self.orig_len.to_le_bytes());
        out[13..21].copy_from_slice(&self.stored_len.to_le_bytes());
        out[21..].copy_from_slice(self.hash.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(HistoryError::BrokenStorage(format!(
                "blob header truncated: {} bytes",
                bytes.len()
            )));
        }
        if bytes[..4] != Self::MAGIC {
            return Err(HistoryError::BrokenStorage("bad blob magic".into()));
        }
        let mut orig = [0u8; 8];
        let mut stored = [0u8; 8];
        let mut hash = [0u8; 32];
        orig.copy_from_slice(&bytes[5..13]);
        stored.copy_from_slice(&bytes[13..21]);
        hash.copy_from_slice(&bytes[21..Self::LEN]);
        Ok(Self {
            flags: bytes[4],
            orig_len: u64::from_le_bytes(orig),
            stored_len: u64::from_le_bytes(stored),
            hash: ContentHash::from_bytes(hash),
        })
    }
}

/// Encode bytes as header + (possibly compressed) payload
pub fn encode_blob(data: &[u8]) -> Result<Vec<u8>> {
    let hash = hash_bytes(data);
    let (payload, compressed) = if data.len() > COMPRESSION_THRESHOLD {
        let packed = zstd::encode_all(data, 3)?;
        if packed.len() < data.len() {
            (packed, true)
        } else {
            (data.to_vec(), false)
        }
    } else {
        (data.to_vec(), false)
    };

    let header = BlobHeaderV1::new(data.len() as u64, payload.len() as u64, compressed, hash);
    let mut out = Vec::with_capacity(BlobHeaderV1::LEN + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a blob written by [`encode_blob`], verifying its digest
pub fn decode_blob(raw: &[u8]) -> Result<Vec<u8>> {
    let header = BlobHeaderV1::from_bytes(raw)?;
    let payload = &raw[BlobHeaderV1::LEN..];
    if payload.len() as u64 != header.stored_len {
        return Err(HistoryError::BrokenStorage(format!(
            "blob payload is {} bytes, header says {}",
            payload.len(),
            header.stored_len
        )));
    }
    let data = if header.is_compressed() {
        zstd::decode_all(payload)?
    } else {
        payload.to_vec()
    };
    if hash_bytes(&data) != header.hash {
        return Err(HistoryError::BrokenStorage(format!(
            "blob {} failed its checksum",
            header.hash.short()
        )));
    }
    Ok(data)
}

#[derive(Default)]
struct MemoryBlobs {
    blobs: BTreeMap<StoredId, Vec<u8>>,
    by_hash: AHashMap<ContentHash, StoredId>,
    next_id: StoredId,
}

/// Blob storage held entirely in memory
#[derive(Default)]
pub struct MemoryContentStorage {
    inner: RwLock<MemoryBlobs>,
}

impl MemoryContentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStorage for MemoryContentStorage {
    fn store(&self, bytes: &[u8]) -> Result<StoredId> {
        let hash = hash_bytes(bytes);
        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_hash.get(&hash) {
            return Ok(id);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.blobs.insert(id, bytes.to_vec());
        inner.by_hash.insert(hash, id);
        Ok(id)
    }

    fn load(&self, id: StoredId) -> Result<Vec<u8>> {
        self.inner
            .read()
            .blobs
            .get(&id)
            .cloned()
            .ok_or_else(|| HistoryError::BrokenStorage(format!("missing content {id}")))
    }

    fn remove(&self, id: StoredId) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(bytes) = inner.blobs.remove(&id) {
            let hash = hash_bytes(&bytes);
            inner.by_hash.remove(&hash);
        }
        Ok(())
    }

    fn ids(&self) -> Vec<StoredId> {
        self.inner.read().blobs.keys().copied().collect()
    }
}

#[derive(Default)]
struct BlobIndex {
    by_hash: AHashMap<ContentHash, StoredId>,
    by_id: BTreeMap<StoredId, ContentHash>,
    next_id: StoredId,
}

/// Blob storage with one file per blob under a directory
pub struct FileContentStorage {
    root: PathBuf,
    tmp_dir: PathBuf,
    index: RwLock<BlobIndex>,
}

impl FileContentStorage {
    /// Open (or create) blob storage at `root`, staging writes in `tmp_dir`
    pub fn open(root: &Path, tmp_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        std::fs::create_dir_all(tmp_dir)?;

        let mut index = BlobIndex::default();
        for item in std::fs::read_dir(root)? {
            let item = item?;
            let name = item.file_name();
            let Some(id) = name.to_str().and_then(|n| StoredId::from_str_radix(n, 16).ok()) else {
                continue;
            };
            match read_header(&item.path()) {
                Ok(header) => {
                    index.by_hash.insert(header.hash, id);
                    index.by_id.insert(id, header.hash);
                }
                Err(e) => warn!("Skipping unreadable blob {}: {}", item.path().display(), e),
            }
            index.next_id = index.next_id.max(id + 1);
        }
        debug!("Opened content storage with {} blobs", index.by_id.len());

        Ok(Self {
            root: root.to_path_buf(),
            tmp_dir: tmp_dir.to_path_buf(),
            index: RwLock::new(index),
        })
    }

    fn blob_path(&self, id: StoredId) -> PathBuf {
        self.root.join(format!("{id:016x}"))
    }
}

fn read_header(path: &Path) -> Result<BlobHeaderV1> {
    use std::io::Read;

    let mut buf = [0u8; BlobHeaderV1::LEN];
    std::fs::File::open(path)?.read_exact(&mut buf)?;
    BlobHeaderV1::from_bytes(&buf)
}

impl ContentStorage for FileContentStorage {
    fn store(&self, bytes: &[u8]) -> Result<StoredId> {
        let hash = hash_bytes(bytes);
        let mut index = self.index.write();
        if let Some(&id) = index.by_hash.get(&hash) {
            return Ok(id);
        }
        let id = index.next_id;
        atomic_write(&self.tmp_dir, &self.blob_path(id), &encode_blob(bytes)?)?;
        index.next_id += 1;
        index.by_hash.insert(hash, id);
        index.by_id.insert(id, hash);
        Ok(id)
    }

    fn load(&self, id: StoredId) -> Result<Vec<u8>> {
        let raw = std::fs::read(self.blob_path(id)).map_err(|e| {
            HistoryError::BrokenStorage(format!("cannot read content {id}: {e}"))
        })?;
        decode_blob(&raw)
    }

    fn remove(&self, id: StoredId) -> Result<()> {
        let mut index = self.index.write();
        if let Some(hash) = index.by_id.remove(&id) {
            index.by_hash.remove(&hash);
            match std::fs::remove_file(self.blob_path(id)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn ids(&self) -> Vec<StoredId> {
        self.index.read().by_id.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_header_serialization() {
        let header = BlobHeaderV1::new(1000, 500, true, hash_bytes(b"x"));
        let parsed = BlobHeaderV1::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, parsed);
        assert!(parsed.is_compressed());
    }

    #[test]
    fn test_blob_compression() {
        let data = b"hello world".repeat(1000);
        let encoded = encode_blob(&data).unwrap();
        let header = BlobHeaderV1::from_bytes(&encoded).unwrap();
        assert!(header.is_compressed());
        assert!(encoded.len() < data.len());
        assert_eq!(decode_blob(&encoded).unwrap(), data);
    }

    #[test]
    fn test_small_blob_is_not_compressed() {
        let encoded = encode_blob(b"tiny").unwrap();
        assert!(!BlobHeaderV1::from_bytes(&encoded).unwrap().is_compressed());
        assert_eq!(decode_blob(&encoded).unwrap(), b"tiny");
    }

    #[test]
    fn test_corrupt_blob_is_detected() {
        let mut encoded = encode_blob(b"some content").unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(
            decode_blob(&encoded),
            Err(HistoryError::BrokenStorage(_))
        ));
    }

    #[test]
    fn test_memory_storage_dedups_and_removes() {
        let storage = MemoryContentStorage::new();
        let a = storage.store(b"abc").unwrap();
        let b = storage.store(b"abc").unwrap();
        let c = storage.store(b"def").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(storage.load(c).unwrap(), b"def");

        storage.remove(a).unwrap();
        assert!(storage.load(a).is_err());
        assert_eq!(storage.ids(), vec![c]);
    }

    #[test]
    fn test_file_storage_write_read_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("content");
        let tmp = temp_dir.path().join("tmp");

        let id = {
            let storage = FileContentStorage::open(&root, &tmp).unwrap();
            let id = storage.store(b"test data").unwrap();
            assert_eq!(storage.store(b"test data").unwrap(), id);
            id
        };

        let storage = FileContentStorage::open(&root, &tmp).unwrap();
        assert_eq!(storage.load(id).unwrap(), b"test data");
        assert_eq!(storage.store(b"test data").unwrap(), id);

        let other = storage.store(b"other").unwrap();
        assert!(other > id);

        storage.remove(id).unwrap();
        assert!(storage.load(id).is_err());
        assert_eq!(storage.ids(), vec![other]);
    }
}
