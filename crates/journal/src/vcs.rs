//! `LocalVcs`: the live entry tree plus the change list behind it
//!
//! Every mutating operation applies a change to the live tree and records
//! it. Changes made between `begin_change_set` and the matching
//! `end_change_set` are grouped; anything done outside such a pair gets a
//! change set of its own. Closed change sets are written to the log right
//! away, while the tree itself is only saved (as a memento) by `save`.

use crate::change::{Change, ChangeId, ChangeKind};
use crate::change_list::ChangeList;
use crate::change_set::{ChangeSet, LabelScope};
use crate::clock::Clock;
use crate::config::VcsConfig;
use crate::label::{label_not_found, revert_until, ByteContent, Label};
use crate::retention::{self, PurgeReport};
use crate::revision::{self, RecentChange, Revision};
use crate::storage::Storage;
use crate::visitor::{self, ChangeVisitor};
use lh_core::paths;
use lh_core::{
    Content, ContentFactory, ContentStorage, Entry, EntryId, HistoryError, Memento, Result,
    RootEntry, Store,
};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct PendingChangeSet {
    depth: usize,
    changes: Vec<Change>,
    /// Most recent name given to a nested end
    inner_name: Option<String>,
}

pub struct LocalVcs {
    root: RootEntry,
    changes: ChangeList,
    storage: Storage,
    content: Arc<dyn ContentStorage>,
    config: VcsConfig,
    clock: Arc<dyn Clock>,
    next_entry_id: EntryId,
    next_change_id: ChangeId,
    /// Newest change set already in the log
    last_change_set_id: Option<ChangeId>,
    pending: Option<PendingChangeSet>,
    dirty: bool,
}

/// State recovered from storage
struct Restored {
    root: RootEntry,
    changes: ChangeList,
    next_entry_id: EntryId,
    next_change_id: ChangeId,
    last_change_set_id: Option<ChangeId>,
}

impl LocalVcs {
    /// History kept only in memory
    pub fn in_memory(config: VcsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::load(Storage::in_memory(), config, clock)
    }

    /// Open the history stored in an initialized `.lh/` directory.
    ///
    /// Settings that cannot be read fall back to defaults, and storage that
    /// cannot be opened is recreated empty.
    pub fn open(store: &Store, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = VcsConfig::load(&store.config_path()).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings, using defaults: {}", e);
            VcsConfig::default()
        });
        let storage = match Storage::open(store) {
            Ok(storage) => storage,
            Err(e) => {
                warn!("History storage cannot be opened, starting with empty history: {}", e);
                Storage::recreate(store)?
            }
        };
        Ok(Self::load(storage, config, clock))
    }

    /// Rebuild the live tree from `storage`. Broken storage is wiped and
    /// history starts over empty.
    pub fn load(storage: Storage, config: VcsConfig, clock: Arc<dyn Clock>) -> Self {
        let restored = match restore(&storage, &config) {
            Ok(restored) => restored,
            Err(e) => {
                warn!("History storage is broken, starting with empty history: {}", e);
                Restored {
                    root: RootEntry::new(config.case()),
                    changes: reset(&storage),
                    next_entry_id: 1,
                    next_change_id: 1,
                    last_change_set_id: None,
                }
            }
        };

        Self {
            root: restored.root,
            changes: restored.changes,
            content: storage.content(),
            storage,
            config,
            clock,
            next_entry_id: restored.next_entry_id,
            next_change_id: restored.next_change_id,
            last_change_set_id: restored.last_change_set_id,
            pending: None,
            dirty: false,
        }
    }

    pub fn root(&self) -> &RootEntry {
        &self.root
    }

    pub fn config(&self) -> &VcsConfig {
        &self.config
    }

    pub fn content_storage(&self) -> &dyn ContentStorage {
        &*self.content
    }

    pub fn find_entry(&self, path: &str) -> Option<&Entry> {
        self.root.find_entry(path)
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.root.has_entry(path)
    }

    /// Current bytes of the file at `path`; `None` when unavailable
    pub fn current_content(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let entry = self.root.get_entry(path)?;
        let content = entry
            .content()
            .ok_or_else(|| HistoryError::NotAFile(path.to_string()))?;
        content.bytes(&*self.content)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Change sets in the log, newest first
    pub fn change_sets(&self) -> impl Iterator<Item = &ChangeSet> + '_ {
        self.changes.iter()
    }

    pub fn begin_change_set(&mut self) {
        self.pending.get_or_insert_with(PendingChangeSet::default).depth += 1;
    }

    /// Close the innermost open change set. Only the outermost close
    /// records anything: its name wins, falling back to the latest name
    /// given to a nested close. A set with no changes is dropped.
    pub fn end_change_set(&mut self, name: Option<&str>) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            warn!("end_change_set called without a matching begin");
            return Ok(());
        };
        pending.depth -= 1;
        if pending.depth > 0 {
            if let Some(name) = name {
                pending.inner_name = Some(name.to_string());
            }
            return Ok(());
        }
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let name = name.map(str::to_string).or(pending.inner_name);
        self.close_change_set(pending.changes, name)
    }

    pub fn create_file(
        &mut self,
        path: &str,
        content: &(impl ContentFactory + ?Sized),
        timestamp: i64,
        read_only: bool,
    ) -> Result<()> {
        self.check_can_create(path, false)?;
        let content = self.create_content(content)?;
        let entry_id = self.next_entry_id;
        self.record(ChangeKind::CreateFile {
            path: path.to_string(),
            entry_id,
            content,
            file_timestamp: timestamp,
            read_only,
        })?;
        self.next_entry_id += 1;
        Ok(())
    }

    /// Create one directory. Missing parents are not created, except that
    /// a directory outside every known root becomes a new root.
    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        self.check_can_create(path, true)?;
        let entry_id = self.next_entry_id;
        self.record(ChangeKind::CreateDirectory {
            path: path.to_string(),
            entry_id,
        })?;
        self.next_entry_id += 1;
        Ok(())
    }

    /// Create whatever directories are missing along `path`, each one
    /// recorded as its own change
    pub fn ensure_directory_exists(&mut self, path: &str) -> Result<()> {
        for dir in self.root.missing_directories(path)? {
            self.create_directory(&dir)?;
        }
        Ok(())
    }

    /// Record new content. Byte-identical content records nothing.
    pub fn change_file_content(
        &mut self,
        path: &str,
        content: &(impl ContentFactory + ?Sized),
        timestamp: i64,
    ) -> Result<()> {
        let current = self
            .root
            .get_entry(path)?
            .content()
            .ok_or_else(|| HistoryError::NotAFile(path.to_string()))?;

        let new_content = if content.len()? > self.config.max_content_length {
            Content::Unavailable
        } else {
            let bytes = content.bytes()?;
            if current.has_bytes(&bytes) {
                debug!("Content of {} is unchanged", path);
                return Ok(());
            }
            self.create_content(&bytes)?
        };
        self.record(ChangeKind::content_change(path, new_content, timestamp))
    }

    pub fn set_read_only(&mut self, path: &str, read_only: bool) -> Result<()> {
        let entry = self.root.get_entry(path)?;
        if entry.is_directory() {
            return Err(HistoryError::NotAFile(path.to_string()));
        }
        if entry.is_read_only() == read_only {
            return Ok(());
        }
        self.record(ChangeKind::read_only(path, read_only))
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        self.record(ChangeKind::rename(path, new_name))
    }

    pub fn move_entry(&mut self, path: &str, new_parent: &str) -> Result<()> {
        self.record(ChangeKind::move_to(path, new_parent))
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.record(ChangeKind::delete(path))
    }

    /// Bring back a file under its old id
    pub fn restore_file(
        &mut self,
        id: EntryId,
        path: &str,
        content: &(impl ContentFactory + ?Sized),
        timestamp: i64,
        read_only: bool,
    ) -> Result<()> {
        self.check_restore(id, path, false)?;
        let content = self.create_content(content)?;
        self.record(ChangeKind::CreateFile {
            path: path.to_string(),
            entry_id: id,
            content,
            file_timestamp: timestamp,
            read_only,
        })?;
        self.next_entry_id = self.next_entry_id.max(id + 1);
        Ok(())
    }

    /// Bring back a directory under its old id. Its children are restored
    /// separately.
    pub fn restore_directory(&mut self, id: EntryId, path: &str) -> Result<()> {
        self.check_restore(id, path, true)?;
        self.record(ChangeKind::CreateDirectory {
            path: path.to_string(),
            entry_id: id,
        })?;
        self.next_entry_id = self.next_entry_id.max(id + 1);
        Ok(())
    }

    pub fn put_user_label(&mut self, name: &str, scope: Option<&str>) -> Result<Label> {
        let change_id = self.next_change_id;
        self.record(ChangeKind::PutLabel {
            name: name.to_string(),
            scope: scope.map(str::to_string),
        })?;
        Ok(Label {
            change_id,
            name: name.to_string(),
            scope: scope.map(str::to_string),
            color: None,
        })
    }

    pub fn put_system_label(&mut self, name: &str, scope: Option<&str>, color: i32) -> Result<Label> {
        let change_id = self.next_change_id;
        self.record(ChangeKind::PutSystemLabel {
            name: name.to_string(),
            scope: scope.map(str::to_string),
            color,
        })?;
        Ok(Label {
            change_id,
            name: name.to_string(),
            scope: scope.map(str::to_string),
            color: Some(color),
        })
    }

    /// Labels in the log, newest first
    pub fn labels(&self) -> Vec<Label> {
        self.changes
            .iter()
            .flat_map(|set| set.changes.iter().rev())
            .filter_map(Label::from_change)
            .collect()
    }

    /// Newest label called `name`
    pub fn find_label(&self, name: &str) -> Option<Label> {
        self.labels().into_iter().find(|l| l.name == name)
    }

    /// What `path` held when `label` was put. An entry that exists now is
    /// followed by id across later renames and moves; any other path is
    /// looked up as it was at the label.
    pub fn label_content(&self, label: &Label, path: &str) -> Result<ByteContent> {
        let current_id = self.root.find_entry(path).map(|e| e.id);
        let mut tree = self.root.clone();
        let pending = self.pending.iter().flat_map(|p| p.changes.iter().rev());
        let found = revert_until(&mut tree, pending, label.change_id)?
            || revert_until(
                &mut tree,
                self.changes.iter().flat_map(|set| set.changes.iter().rev()),
                label.change_id,
            )?;
        if !found {
            return Err(label_not_found(label));
        }
        let entry = match current_id.and_then(|id| tree.find_by_id(id)) {
            Some((_, entry)) => entry,
            None => tree.get_entry(path)?,
        };
        ByteContent::of(entry, &*self.content)
    }

    /// Revisions of the entry at `path`, newest first
    pub fn revisions_for(&self, path: &str) -> Result<Vec<Revision>> {
        self.revisions_in_scope(path, LabelScope::All)
    }

    /// Like [`revisions_for`](Self::revisions_for), showing only labels
    /// visible from `scope`. A plain `Option<&str>` matches scope keys
    /// exactly.
    pub fn revisions_in_scope<'a>(
        &self,
        path: &str,
        scope: impl Into<LabelScope<'a>>,
    ) -> Result<Vec<Revision>> {
        let root = self.committed_root()?;
        revision::revisions_for(&self.changes, &root, path, scope.into())
    }

    /// Closed change sets that touched the entry at `path` or hold a label
    /// visible from `scope`, newest first, keeping those `filter` accepts
    pub fn collect_changes<'a>(
        &self,
        path: &str,
        scope: impl Into<LabelScope<'a>>,
        filter: impl FnMut(&ChangeSet) -> bool,
    ) -> Result<Vec<ChangeSet>> {
        let root = self.committed_root()?;
        let sets = self.changes.collect_changes(&root, path, scope.into(), filter)?;
        Ok(sets.into_iter().cloned().collect())
    }

    /// Bytes of the newest revision whose file timestamp satisfies
    /// `matches`; `None` when no revision does or its content was not kept
    pub fn byte_content(&self, path: &str, matches: impl Fn(i64) -> bool) -> Result<Option<Vec<u8>>> {
        for revision in self.revisions_for(path)? {
            match revision.file_timestamp() {
                Some(timestamp) if matches(timestamp) => return revision.content(&*self.content),
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn recent_changes(&self) -> Result<Vec<RecentChange>> {
        let root = self.committed_root()?;
        revision::recent_changes(&self.changes, &root, self.config.recent_changes_limit)
    }

    pub fn accept_read(&self, visitor: &mut dyn ChangeVisitor) -> Result<()> {
        let root = self.committed_root()?;
        visitor::accept_read(&self.changes, &root, visitor)
    }

    /// Save the live tree. Does nothing when nothing changed, and waits
    /// while a change set is open.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.has_pending_changes() {
            debug!("Deferring save until the open change set is closed");
            return Ok(());
        }
        self.write_memento()?;
        self.dirty = false;
        info!("Saved history with {} change sets", self.changes.len());
        Ok(())
    }

    /// Drop change sets older than `period_millis` and the contents only
    /// they used, then save
    pub fn purge_obsolete_and_save(&mut self, period_millis: i64) -> Result<PurgeReport> {
        if self.has_pending_changes() {
            debug!("Skipping purge while a change set is open");
            return Ok(PurgeReport::default());
        }
        // The memento must cover every set before any of them disappear
        self.write_memento()?;
        self.dirty = false;

        let cutoff = self.clock.now() - period_millis;
        retention::purge_obsolete(&mut self.changes, &self.root, &*self.content, cutoff)
    }

    fn write_memento(&self) -> Result<()> {
        self.storage.save_memento(&Memento {
            root: self.root.clone(),
            next_entry_id: self.next_entry_id,
            next_change_id: self.next_change_id,
            last_change_set_id: self.last_change_set_id,
        })
    }

    fn has_pending_changes(&self) -> bool {
        self.pending.as_ref().map_or(false, |p| !p.changes.is_empty())
    }

    /// The live tree without the changes of the open change set
    fn committed_root(&self) -> Result<Cow<'_, RootEntry>> {
        match &self.pending {
            Some(pending) if !pending.changes.is_empty() => {
                let mut tree = self.root.clone();
                for change in pending.changes.iter().rev() {
                    change.revert_on(&mut tree)?;
                }
                Ok(Cow::Owned(tree))
            }
            _ => Ok(Cow::Borrowed(&self.root)),
        }
    }

    fn create_content(&self, factory: &(impl ContentFactory + ?Sized)) -> Result<Content> {
        Content::create(factory, &*self.content, self.config.max_content_length)
    }

    fn record(&mut self, kind: ChangeKind) -> Result<()> {
        let mut change = Change::new(self.next_change_id, self.clock.now(), kind);
        change.apply_to(&mut self.root)?;
        self.next_change_id += 1;
        self.dirty = true;
        debug!("Recorded {}", change.kind);

        if let Some(pending) = self.pending.as_mut() {
            pending.changes.push(change);
            return Ok(());
        }
        self.close_change_set(vec![change], None)
    }

    fn close_change_set(&mut self, changes: Vec<Change>, name: Option<String>) -> Result<()> {
        let id = self.next_change_id;
        let Some(set) = ChangeSet::new(id, name, changes) else {
            debug!("Dropped empty change set");
            return Ok(());
        };
        self.next_change_id += 1;
        self.changes.append(set)?;
        self.last_change_set_id = Some(id);
        Ok(())
    }

    /// Fail early, before any content is stored, when `path` cannot be created
    fn check_can_create(&self, path: &str, directory: bool) -> Result<()> {
        if self.root.has_entry(path) {
            return Err(HistoryError::DuplicateEntry(path.to_string()));
        }
        match self.root.parent_for_new(path) {
            Some(parent) => match self.root.find_entry(&parent) {
                Some(entry) if entry.is_directory() => Ok(()),
                Some(_) => Err(HistoryError::InvalidMove {
                    path: path.to_string(),
                    reason: "parent is not a directory",
                }),
                None => Err(HistoryError::not_found(&parent)),
            },
            None if directory => Ok(()),
            None => match paths::parent_of(path) {
                Some(parent) => Err(HistoryError::not_found(parent)),
                None => Ok(()),
            },
        }
    }

    fn check_restore(&self, id: EntryId, path: &str, directory: bool) -> Result<()> {
        let invalid = |reason| HistoryError::InvalidRestoreTarget {
            id,
            path: path.to_string(),
            reason,
        };
        if self.root.has_entry(path) {
            return Err(invalid("path is occupied"));
        }
        if self.root.find_by_id(id).is_some() {
            return Err(invalid("id is still in use"));
        }
        match self.check_can_create(path, directory) {
            Ok(()) => Ok(()),
            Err(HistoryError::NotFound(_)) => Err(invalid("parent does not exist")),
            Err(HistoryError::InvalidMove { .. }) => Err(invalid("parent is not a directory")),
            Err(e) => Err(e),
        }
    }
}

fn restore(storage: &Storage, config: &VcsConfig) -> Result<Restored> {
    let memento = storage.load_memento()?;
    let mut changes = ChangeList::load(storage.change_list_storage())?;

    let (mut root, mut next_entry_id, mut next_change_id, watermark) = match memento {
        Some(m) => (m.root, m.next_entry_id, m.next_change_id, m.last_change_set_id),
        None => (RootEntry::new(config.case()), 1, 1, None),
    };

    if let (Some(watermark), Some(last)) = (watermark, changes.last()) {
        if last.id < watermark {
            return Err(HistoryError::BrokenStorage(format!(
                "saved tree includes change set {} but the log ends at {}",
                watermark, last.id
            )));
        }
    }

    let replayed = changes.replay_onto(&mut root, watermark)?;
    if replayed > 0 {
        debug!("Replayed {} change sets onto the saved tree", replayed);
    }

    if let Some(max) = changes.max_id() {
        next_change_id = next_change_id.max(max + 1);
    }
    let max_entry = changes
        .iter()
        .flat_map(|set| &set.changes)
        .filter_map(|c| match &c.kind {
            ChangeKind::CreateFile { entry_id, .. } | ChangeKind::CreateDirectory { entry_id, .. } => {
                Some(*entry_id)
            }
            _ => None,
        })
        .chain(root.max_id())
        .max();
    if let Some(max) = max_entry {
        next_entry_id = next_entry_id.max(max + 1);
    }

    let last_change_set_id = changes.last().map(|s| s.id).or(watermark);
    info!("Loaded history with {} change sets", changes.len());
    Ok(Restored {
        root,
        changes,
        next_entry_id,
        next_change_id,
        last_change_set_id,
    })
}

/// Wipe broken storage and hand back an empty change list over it
fn reset(storage: &Storage) -> ChangeList {
    let blocks = storage.change_list_storage();
    let results = [blocks.clear(), storage.clear_memento(), storage.clear_content()];
    for result in results {
        if let Err(e) = result {
            warn!("Failed to clear broken history: {}", e);
        }
    }
    ChangeList::empty(blocks)
}
