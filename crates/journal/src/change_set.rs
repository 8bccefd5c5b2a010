//! Change sets: the unit of grouping, persistence and undo

use crate::change::{Change, ChangeId};
use ahash::AHashSet;
use lh_core::{CaseSensitivity, IdPath, Result, RootEntry, StoredId};
use serde::{Deserialize, Serialize};

/// Which labels a history query sees. Unscoped labels are always visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelScope<'a> {
    All,
    /// Labels whose scope is exactly this key
    Key(&'a str),
    /// Labels scoped to this path or one of its ancestors
    Path(&'a str),
}

impl<'a> From<Option<&'a str>> for LabelScope<'a> {
    fn from(scope: Option<&'a str>) -> Self {
        scope.map_or(Self::All, Self::Key)
    }
}

impl LabelScope<'_> {
    pub fn sees(&self, label_scope: Option<&str>, case: CaseSensitivity) -> bool {
        match (self, label_scope) {
            (Self::All, _) | (_, None) => true,
            (Self::Key(key), Some(scope)) => *key == scope,
            (Self::Path(path), Some(scope)) => case.starts_with(path, scope),
        }
    }
}

/// Changes recorded between the outermost begin/end pair, or a single
/// change made outside any pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: ChangeId,
    pub name: Option<String>,
    /// Timestamp of the first change
    pub timestamp: i64,
    pub changes: Vec<Change>,
}

impl ChangeSet {
    /// Group `changes`; `None` when there is nothing to group
    pub fn new(id: ChangeId, name: Option<String>, changes: Vec<Change>) -> Option<Self> {
        let timestamp = changes.first()?.timestamp;
        Some(Self {
            id,
            name,
            timestamp,
            changes,
        })
    }

    pub fn is_labels_only(&self) -> bool {
        self.changes.iter().all(Change::is_label)
    }

    pub fn affects(&self, id_path: &IdPath) -> bool {
        self.changes.iter().any(|c| c.affects(id_path))
    }

    /// Labels in this set visible from `scope`
    pub fn labels_in_scope<'a>(
        &'a self,
        scope: LabelScope<'a>,
        case: CaseSensitivity,
    ) -> impl Iterator<Item = &'a Change> {
        self.changes.iter().filter(move |c| match c.label() {
            Some((_, label_scope)) => scope.sees(label_scope, case),
            None => false,
        })
    }

    /// Undo every change, newest first
    pub fn revert_on(&self, root: &mut RootEntry) -> Result<()> {
        for change in self.changes.iter().rev() {
            change.revert_on(root)?;
        }
        Ok(())
    }

    /// Redo every change in order, as when replaying a log onto a snapshot
    pub fn apply_to(&mut self, root: &mut RootEntry) -> Result<()> {
        for change in &mut self.changes {
            change.apply_to(root)?;
        }
        Ok(())
    }

    pub fn collect_stored_ids(&self, out: &mut AHashSet<StoredId>) {
        for change in &self.changes {
            change.collect_stored_ids(out);
        }
    }

    /// Highest change id in the set, including its own
    pub fn max_id(&self) -> ChangeId {
        self.changes.iter().map(|c| c.id).fold(self.id, ChangeId::max)
    }
}
