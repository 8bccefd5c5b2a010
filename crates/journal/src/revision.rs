//! Revisions of one entry, and recent changes across the tree

use crate::change::ChangeId;
use crate::change_list::ChangeList;
use crate::change_set::{ChangeSet, LabelScope};
use lh_core::{ContentStorage, Difference, Entry, HistoryError, Result, RootEntry};
use std::ops::ControlFlow;

/// An entry as it was right after one change set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub change_set_id: ChangeId,
    pub name: Option<String>,
    /// Name of a label put in this set, if any
    pub label: Option<String>,
    pub timestamp: i64,
    /// Where the entry lived at that point
    pub path: String,
    pub entry: Entry,
}

impl Revision {
    /// File bytes at this revision; `None` for directories and unavailable content
    pub fn content(&self, storage: &dyn ContentStorage) -> Result<Option<Vec<u8>>> {
        match self.entry.content() {
            Some(content) => content.bytes(storage),
            None => Ok(None),
        }
    }

    /// Modification stamp of the file at this revision
    pub fn file_timestamp(&self) -> Option<i64> {
        self.entry.timestamp()
    }
}

/// Revisions of the entry at `path`, newest first
pub fn revisions_for(
    changes: &ChangeList,
    root: &RootEntry,
    path: &str,
    scope: LabelScope<'_>,
) -> Result<Vec<Revision>> {
    let mut out = Vec::new();
    changes.walk_entry(root, path, scope, |set, tree, entry_id| {
        let (path, entry) = tree
            .find_by_id(entry_id)
            .ok_or_else(|| HistoryError::Inconsistent(format!("entry {entry_id} vanished")))?;
        out.push(Revision {
            change_set_id: set.id,
            name: set.name.clone(),
            label: set
                .labels_in_scope(scope, root.case())
                .find_map(|c| c.label().map(|(name, _)| name.to_string())),
            timestamp: set.timestamp,
            path,
            entry: entry.clone(),
        });
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(out)
}

/// A named change set with the whole tree before and after it
#[derive(Debug, Clone)]
pub struct RecentChange {
    pub change_set: ChangeSet,
    pub before: RootEntry,
    pub after: RootEntry,
}

impl RecentChange {
    pub fn name(&self) -> &str {
        self.change_set.name.as_deref().unwrap_or_default()
    }

    pub fn timestamp(&self) -> i64 {
        self.change_set.timestamp
    }

    pub fn differences(&self) -> Vec<Difference> {
        Difference::between(&self.before, &self.after)
    }
}

/// Up to `limit` named change sets with structural changes, newest first
pub fn recent_changes(changes: &ChangeList, root: &RootEntry, limit: usize) -> Result<Vec<RecentChange>> {
    let mut out = Vec::new();
    let mut tree = root.clone();
    for set in changes.iter() {
        if out.len() >= limit {
            break;
        }
        let wanted = set.name.is_some() && !set.is_labels_only();
        let after = wanted.then(|| tree.clone());
        set.revert_on(&mut tree)?;
        if let Some(after) = after {
            out.push(RecentChange {
                change_set: set.clone(),
                before: tree.clone(),
                after,
            });
        }
    }
    Ok(out)
}
