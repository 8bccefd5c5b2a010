//! The change list: every closed change set, oldest first

use crate::change_set::{ChangeSet, LabelScope};
use crate::journal::{BlockId, ChangeListStorage};
use lh_core::{EntryId, HistoryError, IdPath, Result, RootEntry};
use std::ops::ControlFlow;
use tracing::debug;

pub struct ChangeList {
    storage: Box<dyn ChangeListStorage>,
    /// Loaded sets with the block each one lives in, oldest first
    sets: Vec<(BlockId, ChangeSet)>,
}

impl ChangeList {
    /// Read every block from `storage`
    pub fn load(storage: Box<dyn ChangeListStorage>) -> Result<Self> {
        let mut sets = Vec::new();
        let mut before = None;
        while let Some((id, set)) = storage.read_previous(before)? {
            sets.push((id, set));
            before = Some(id);
        }
        sets.reverse();
        check_ids_increase(&sets)?;
        debug!("Loaded {} change sets", sets.len());
        Ok(Self { storage, sets })
    }

    /// A list with nothing loaded, for storage that was just cleared
    pub fn empty(storage: Box<dyn ChangeListStorage>) -> Self {
        Self {
            storage,
            sets: Vec::new(),
        }
    }

    /// Re-apply every set newer than `after` onto `root`, oldest first.
    /// Returns how many sets were replayed.
    pub fn replay_onto(&mut self, root: &mut RootEntry, after: Option<i64>) -> Result<usize> {
        let mut replayed = 0;
        for (_, set) in &mut self.sets {
            if after.map_or(true, |id| set.id > id) {
                set.apply_to(root)?;
                replayed += 1;
            }
        }
        Ok(replayed)
    }

    /// Persist a closed set after the existing ones
    pub fn append(&mut self, set: ChangeSet) -> Result<()> {
        if let Some((_, last)) = self.sets.last() {
            if set.id <= last.max_id() {
                return Err(HistoryError::Inconsistent(format!(
                    "change set {} is not newer than {}",
                    set.id, last.id
                )));
            }
        }
        let block = self.storage.write_next_block(&set)?;
        self.sets.push((block, set));
        Ok(())
    }

    /// Change sets newest first. Each call starts over from the newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChangeSet> + ExactSizeIterator + '_ {
        self.sets.iter().rev().map(|(_, set)| set)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn last(&self) -> Option<&ChangeSet> {
        self.sets.last().map(|(_, set)| set)
    }

    /// Highest change or change set id in the list
    pub fn max_id(&self) -> Option<i64> {
        self.sets.iter().map(|(_, s)| s.max_id()).max()
    }

    /// Walk newest first over a copy of `root`, calling `f` for every set
    /// that touched the entry at `path` or holds a label visible from
    /// `scope`. `f` sees the tree as it was right after the set. The walk
    /// ends once the entry did not exist yet.
    pub fn walk_entry<F>(&self, root: &RootEntry, path: &str, scope: LabelScope<'_>, mut f: F) -> Result<()>
    where
        F: FnMut(&ChangeSet, &RootEntry, EntryId) -> Result<ControlFlow<()>>,
    {
        let entry_id = root.get_entry(path)?.id;
        let mut tree = root.clone();
        for set in self.iter() {
            let Some(id_path) = id_path_of_id(&tree, entry_id) else {
                break;
            };
            let relevant =
                set.affects(&id_path) || set.labels_in_scope(scope, root.case()).next().is_some();
            if relevant && f(set, &tree, entry_id)?.is_break() {
                break;
            }
            set.revert_on(&mut tree)?;
        }
        Ok(())
    }

    /// Sets that touched the entry at `path` (or are visible labels),
    /// newest first, keeping those `filter` accepts
    pub fn collect_changes(
        &self,
        root: &RootEntry,
        path: &str,
        scope: LabelScope<'_>,
        mut filter: impl FnMut(&ChangeSet) -> bool,
    ) -> Result<Vec<&ChangeSet>> {
        let mut ids = Vec::new();
        self.walk_entry(root, path, scope, |set, _, _| {
            if filter(set) {
                ids.push(set.id);
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(self.iter().filter(|s| ids.contains(&s.id)).collect())
    }

    /// Remove the oldest sets stamped before `cutoff`. Stops at the first
    /// set that is new enough, so the surviving history stays contiguous.
    pub fn purge_obsolete(&mut self, cutoff: i64) -> Result<Vec<ChangeSet>> {
        let count = self
            .sets
            .iter()
            .take_while(|(_, set)| set.timestamp < cutoff)
            .count();
        let mut removed = Vec::with_capacity(count);
        for (block, set) in self.sets.drain(..count) {
            self.storage.remove_block(block)?;
            removed.push(set);
        }
        self.storage.flush()?;
        debug!("Purged {} change sets older than {}", removed.len(), cutoff);
        Ok(removed)
    }

    /// Forget everything, in memory and in storage
    pub fn clear(&mut self) -> Result<()> {
        self.sets.clear();
        self.storage.clear()
    }
}

fn id_path_of_id(tree: &RootEntry, id: EntryId) -> Option<IdPath> {
    let path = tree.path_of_id(id)?;
    tree.id_path_of(&path)
}

fn check_ids_increase(sets: &[(BlockId, ChangeSet)]) -> Result<()> {
    for pair in sets.windows(2) {
        if pair[1].1.id <= pair[0].1.max_id() {
            return Err(HistoryError::BrokenStorage(format!(
                "change set {} follows newer set {}",
                pair[1].1.id, pair[0].1.id
            )));
        }
    }
    Ok(())
}
