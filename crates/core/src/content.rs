//! File contents as recorded in history

use crate::blob::{ContentStorage, StoredId};
use crate::hash::{hash_bytes, ContentHash};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Produces the bytes of a file on demand.
///
/// The length is asked first so that files over the size limit are never
/// read at all.
pub trait ContentFactory {
    fn len(&self) -> Result<u64>;

    fn bytes(&self) -> Result<Vec<u8>>;
}

impl<T: AsRef<[u8]> + ?Sized> ContentFactory for T {
    fn len(&self) -> Result<u64> {
        Ok(self.as_ref().len() as u64)
    }

    fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self.as_ref().to_vec())
    }
}

/// Content of a file at one point in time
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    /// Bytes held inline
    Bytes(Vec<u8>),
    /// Reference into a [`ContentStorage`]
    Stored {
        id: StoredId,
        hash: ContentHash,
        len: u64,
    },
    /// File was too large to keep
    Unavailable,
}

impl Content {
    /// Record the factory's bytes in `storage`, or mark them unavailable
    /// when longer than `max_len`
    pub fn create(
        factory: &(impl ContentFactory + ?Sized),
        storage: &dyn ContentStorage,
        max_len: u64,
    ) -> Result<Self> {
        let len = factory.len()?;
        if len > max_len {
            return Ok(Self::Unavailable);
        }
        let bytes = factory.bytes()?;
        let id = storage.store(&bytes)?;
        Ok(Self::Stored {
            id,
            hash: hash_bytes(&bytes),
            len: bytes.len() as u64,
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// The bytes, or `None` for unavailable content
    pub fn bytes(&self, storage: &dyn ContentStorage) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Bytes(b) => Ok(Some(b.clone())),
            Self::Stored { id, .. } => storage.load(*id).map(Some),
            Self::Unavailable => Ok(None),
        }
    }

    /// Length in bytes, unknown for unavailable content
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Bytes(b) => Some(b.len() as u64),
            Self::Stored { len, .. } => Some(*len),
            Self::Unavailable => None,
        }
    }

    pub fn stored_id(&self) -> Option<StoredId> {
        match self {
            Self::Stored { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn hash(&self) -> Option<ContentHash> {
        match self {
            Self::Bytes(b) => Some(hash_bytes(b)),
            Self::Stored { hash, .. } => Some(*hash),
            Self::Unavailable => None,
        }
    }

    /// True when this content is known to hold exactly `bytes`.
    /// Unavailable content never matches.
    pub fn has_bytes(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Bytes(b) => b == bytes,
            Self::Stored { hash, len, .. } => *len == bytes.len() as u64 && *hash == hash_bytes(bytes),
            Self::Unavailable => false,
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "Bytes({:?})", String::from_utf8_lossy(b)),
            Self::Stored { id, hash, len } => write!(f, "Stored(#{id}, {}, {len}b)", hash.short()),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}
