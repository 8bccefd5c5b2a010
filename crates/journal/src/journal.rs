//! Append-only block storage for the change list
//!
//! Every closed change set is written as one block. Blocks are keyed by a
//! monotonic sequence number and never rewritten; purging only removes the
//! oldest ones.

use crate::change_set::ChangeSet;
use lh_core::hash::checksum;
use lh_core::{HistoryError, Result};
use parking_lot::RwLock;
use sled::Db;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Position of a block in the log
pub type BlockId = u64;

/// Where change list blocks are kept
pub trait ChangeListStorage: Send + Sync {
    /// Append a block after the last one
    fn write_next_block(&self, set: &ChangeSet) -> Result<BlockId>;

    /// The block right before `before`, or the last block when `None`
    fn read_previous(&self, before: Option<BlockId>) -> Result<Option<(BlockId, ChangeSet)>>;

    fn remove_block(&self, id: BlockId) -> Result<()>;

    /// Drop every block
    fn clear(&self) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

impl<T: ChangeListStorage + ?Sized> ChangeListStorage for Arc<T> {
    fn write_next_block(&self, set: &ChangeSet) -> Result<BlockId> {
        (**self).write_next_block(set)
    }

    fn read_previous(&self, before: Option<BlockId>) -> Result<Option<(BlockId, ChangeSet)>> {
        (**self).read_previous(before)
    }

    fn remove_block(&self, id: BlockId) -> Result<()> {
        (**self).remove_block(id)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

const BLOCK_MAGIC: [u8; 4] = *b"LHC1";
const BLOCK_HEADER_LEN: usize = 4 + 32;

/// magic(4) + blake3 of payload(32) + bincode payload
pub fn encode_block(set: &ChangeSet) -> Result<Vec<u8>> {
    let payload = bincode::serialize(set)?;
    let mut out = Vec::with_capacity(BLOCK_HEADER_LEN + payload.len());
    out.extend_from_slice(&BLOCK_MAGIC);
    out.extend_from_slice(checksum(&[&payload]).as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode_block(id: BlockId, raw: &[u8]) -> Result<ChangeSet> {
    if raw.len() < BLOCK_HEADER_LEN || raw[..4] != BLOCK_MAGIC {
        return Err(HistoryError::BrokenStorage(format!("block {id} has a bad header")));
    }
    let payload = &raw[BLOCK_HEADER_LEN..];
    if checksum(&[payload]).as_bytes()[..] != raw[4..BLOCK_HEADER_LEN] {
        return Err(HistoryError::BrokenStorage(format!("block {id} failed its checksum")));
    }
    bincode::deserialize(payload)
        .map_err(|e| HistoryError::BrokenStorage(format!("block {id} is undecodable: {e}")))
}

fn db_error(e: sled::Error) -> HistoryError {
    HistoryError::Database(e.to_string())
}

fn block_id(key: &[u8]) -> Result<BlockId> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| HistoryError::BrokenStorage(format!("bad block key of {} bytes", key.len())))?;
    Ok(BlockId::from_be_bytes(bytes))
}

/// Change list blocks in a sled database
pub struct SledChangeListStorage {
    /// Sled database
    db: Db,
    /// Next block id
    seq_counter: AtomicU64,
}

impl SledChangeListStorage {
    /// Open or create block storage in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path.join("blocks.db")).map_err(db_error)?;

        let next = match db.last().map_err(db_error)? {
            Some((key, _)) => block_id(&key)? + 1,
            None => 0,
        };
        debug!("Opened change list with {} blocks", db.len());

        Ok(Self {
            db,
            seq_counter: AtomicU64::new(next),
        })
    }

    /// Number of blocks currently stored
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl ChangeListStorage for SledChangeListStorage {
    fn write_next_block(&self, set: &ChangeSet) -> Result<BlockId> {
        let id = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        self.db
            .insert(id.to_be_bytes(), encode_block(set)?)
            .map_err(db_error)?;

        // Flush to ensure durability
        self.db.flush().map_err(db_error)?;
        Ok(id)
    }

    fn read_previous(&self, before: Option<BlockId>) -> Result<Option<(BlockId, ChangeSet)>> {
        let found = match before {
            Some(id) => self.db.range(..id.to_be_bytes()).next_back(),
            None => self.db.iter().next_back(),
        };
        match found {
            Some(item) => {
                let (key, value) = item.map_err(db_error)?;
                let id = block_id(&key)?;
                Ok(Some((id, decode_block(id, &value)?)))
            }
            None => Ok(None),
        }
    }

    fn remove_block(&self, id: BlockId) -> Result<()> {
        self.db.remove(id.to_be_bytes()).map_err(db_error)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.db.clear().map_err(db_error)?;
        self.db.flush().map_err(db_error)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(db_error)?;
        Ok(())
    }
}

/// Change list blocks kept in memory, encoded as they would be on disk
#[derive(Default)]
pub struct InMemoryChangeListStorage {
    blocks: RwLock<BTreeMap<BlockId, Vec<u8>>>,
    seq_counter: AtomicU64,
}

impl InMemoryChangeListStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeListStorage for InMemoryChangeListStorage {
    fn write_next_block(&self, set: &ChangeSet) -> Result<BlockId> {
        let id = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        self.blocks.write().insert(id, encode_block(set)?);
        Ok(id)
    }

    fn read_previous(&self, before: Option<BlockId>) -> Result<Option<(BlockId, ChangeSet)>> {
        let blocks = self.blocks.read();
        let found = match before {
            Some(id) => blocks.range(..id).next_back(),
            None => blocks.iter().next_back(),
        };
        match found {
            Some((&id, raw)) => Ok(Some((id, decode_block(id, raw)?))),
            None => Ok(None),
        }
    }

    fn remove_block(&self, id: BlockId) -> Result<()> {
        self.blocks.write().remove(&id);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.blocks.write().clear();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, ChangeKind};

    fn set(id: i64) -> ChangeSet {
        let label = Change::new(
            id - 1,
            id * 100,
            ChangeKind::PutLabel {
                name: format!("label {id}"),
                scope: None,
            },
        );
        ChangeSet::new(id, Some(format!("set {id}")), vec![label]).unwrap()
    }

    fn read_all(storage: &dyn ChangeListStorage) -> Vec<(BlockId, i64)> {
        let mut out = Vec::new();
        let mut before = None;
        while let Some((id, set)) = storage.read_previous(before).unwrap() {
            out.push((id, set.id));
            before = Some(id);
        }
        out
    }

    #[test]
    fn test_block_codec_detects_damage() {
        let mut raw = encode_block(&set(2)).unwrap();
        assert_eq!(decode_block(0, &raw).unwrap(), set(2));

        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert!(matches!(
            decode_block(0, &raw),
            Err(HistoryError::BrokenStorage(_))
        ));
        assert!(decode_block(0, b"LHC1").is_err());
    }

    #[test]
    fn test_in_memory_reads_backwards() {
        let storage = InMemoryChangeListStorage::new();
        for id in [2, 4, 6] {
            storage.write_next_block(&set(id)).unwrap();
        }
        assert_eq!(read_all(&storage), vec![(2, 6), (1, 4), (0, 2)]);

        storage.remove_block(0).unwrap();
        assert_eq!(read_all(&storage), vec![(2, 6), (1, 4)]);
        storage.clear().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_sled_storage_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let storage = SledChangeListStorage::open(temp_dir.path()).unwrap();
            storage.write_next_block(&set(2)).unwrap();
            storage.write_next_block(&set(4)).unwrap();
            storage.remove_block(0).unwrap();
        }

        let storage = SledChangeListStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.len(), 1);
        let id = storage.write_next_block(&set(6)).unwrap();
        assert_eq!(id, 2);
        assert_eq!(read_all(&storage), vec![(2, 6), (1, 4)]);
    }

    #[test]
    fn test_sled_storage_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SledChangeListStorage::open(temp_dir.path()).unwrap();
        storage.write_next_block(&set(2)).unwrap();
        storage.clear().unwrap();
        assert!(storage.is_empty());
        assert_eq!(storage.read_previous(None).unwrap(), None);
    }
}
