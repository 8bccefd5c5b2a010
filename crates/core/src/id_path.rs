//! Root-to-leaf chains of entry ids

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Identifier assigned to an entry once, at creation
pub type EntryId = i64;

/// The ids of every entry from a root down to one node.
///
/// Ids survive renames and moves, so an `IdPath` identifies a node across
/// snapshots even when its textual path differs. Never empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdPath {
    ids: SmallVec<[EntryId; 8]>,
}

impl IdPath {
    /// Build a path from ids. Panics if `ids` is empty.
    pub fn new(ids: &[EntryId]) -> Self {
        assert!(!ids.is_empty(), "IdPath must contain at least one id");
        Self {
            ids: SmallVec::from_slice(ids),
        }
    }

    /// Id of the node this path leads to
    pub fn id(&self) -> EntryId {
        self.ids[self.ids.len() - 1]
    }

    /// Id of the first node (the root the entry lives under)
    pub fn root_id(&self) -> EntryId {
        self.ids[0]
    }

    pub fn ids(&self) -> &[EntryId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn appended_with(&self, id: EntryId) -> Self {
        let mut ids = self.ids.clone();
        ids.push(id);
        Self { ids }
    }

    /// Path of the parent node, `None` for a single-element path
    pub fn parent(&self) -> Option<Self> {
        if self.ids.len() < 2 {
            return None;
        }
        Some(Self {
            ids: SmallVec::from_slice(&self.ids[..self.ids.len() - 1]),
        })
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.ids.contains(&id)
    }

    /// True when `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &IdPath) -> bool {
        self.ids.starts_with(&prefix.ids)
    }

    /// True when one path is an ancestor of (or equal to) the other
    pub fn is_child_or_parent_of(&self, other: &IdPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Debug for IdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdPath(")?;
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str(")")
    }
}
