//! Entry tree: the file system as history sees it at one moment
//!
//! A [`RootEntry`] owns a list of root entries, each named by its full root
//! path (`c:/project`, `/home/me/src`, or a bare `dir` in tests). Below the
//! roots every entry is named by a single path segment. Entries own their
//! children; there are no parent pointers, parents are found by path.

use crate::blob::StoredId;
use crate::content::Content;
use crate::error::HistoryError;
use crate::id_path::{EntryId, IdPath};
use crate::paths::{self, CaseSensitivity};
use crate::Result;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// What an entry is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File {
        content: Content,
        /// Modification stamp supplied by the host
        timestamp: i64,
        read_only: bool,
    },
    Directory {
        children: Vec<Entry>,
    },
}

/// A file or directory in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn file(id: EntryId, name: &str, content: Content, timestamp: i64, read_only: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: EntryKind::File {
                content,
                timestamp,
                read_only,
            },
        }
    }

    pub fn directory(id: EntryId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: EntryKind::Directory {
                children: Vec::new(),
            },
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory { .. })
    }

    pub fn content(&self) -> Option<&Content> {
        match &self.kind {
            EntryKind::File { content, .. } => Some(content),
            EntryKind::Directory { .. } => None,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match &self.kind {
            EntryKind::File { timestamp, .. } => Some(*timestamp),
            EntryKind::Directory { .. } => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.kind, EntryKind::File { read_only: true, .. })
    }

    pub fn children(&self) -> &[Entry] {
        match &self.kind {
            EntryKind::Directory { children } => children,
            EntryKind::File { .. } => &[],
        }
    }

    pub fn find_child(&self, name: &str, case: CaseSensitivity) -> Option<&Entry> {
        self.children().iter().find(|c| case.names_equal(&c.name, name))
    }

    pub fn find_child_mut(&mut self, name: &str, case: CaseSensitivity) -> Option<&mut Entry> {
        match &mut self.kind {
            EntryKind::Directory { children } => {
                children.iter_mut().find(|c| case.names_equal(&c.name, name))
            }
            EntryKind::File { .. } => None,
        }
    }

    /// Add a child under this directory. `path` is only used for errors.
    pub fn add_child(&mut self, child: Entry, path: &str, case: CaseSensitivity) -> Result<()> {
        let EntryKind::Directory { children } = &mut self.kind else {
            return Err(HistoryError::InvalidMove {
                path: path.to_string(),
                reason: "parent is not a directory",
            });
        };
        if children.iter().any(|c| case.names_equal(&c.name, &child.name)) {
            return Err(HistoryError::DuplicateEntry(paths::appended(path, &child.name)));
        }
        children.push(child);
        Ok(())
    }

    pub fn remove_child(&mut self, name: &str, case: CaseSensitivity) -> Option<Entry> {
        let EntryKind::Directory { children } = &mut self.kind else {
            return None;
        };
        let index = children.iter().position(|c| case.names_equal(&c.name, name))?;
        Some(children.remove(index))
    }

    /// Find a descendant (or this entry) by id, returning its path relative
    /// to `base`, which is this entry's own path
    pub fn find_by_id(&self, id: EntryId, base: &str) -> Option<(String, &Entry)> {
        if self.id == id {
            return Some((base.to_string(), self));
        }
        self.children()
            .iter()
            .find_map(|c| c.find_by_id(id, &paths::appended(base, &c.name)))
    }

    /// Call `f` for this entry and every descendant, parents first
    pub fn walk<'a>(&'a self, base: &str, f: &mut impl FnMut(&str, &'a Entry)) {
        f(base, self);
        for child in self.children() {
            child.walk(&paths::appended(base, &child.name), f);
        }
    }

    /// Ids of every stored blob referenced from this subtree
    pub fn collect_stored_ids(&self, out: &mut AHashSet<StoredId>) {
        self.walk("", &mut |_, e| {
            if let Some(id) = e.content().and_then(Content::stored_id) {
                out.insert(id);
            }
        });
    }
}

/// Root of the tree: holds the roots and the case rule for lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    roots: Vec<Entry>,
    case: CaseSensitivity,
}

impl RootEntry {
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            roots: Vec::new(),
            case,
        }
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    pub fn roots(&self) -> &[Entry] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Index of the root `path` lives under and the remainder below it.
    /// The longest matching root name wins.
    fn locate<'p>(&self, path: &'p str) -> Option<(usize, &'p str)> {
        let mut best: Option<(usize, &'p str, usize)> = None;
        for (i, root) in self.roots.iter().enumerate() {
            if let Some(rest) = paths::relative(path, &root.name, self.case) {
                if best.map_or(true, |(_, _, len)| root.name.len() > len) {
                    best = Some((i, rest, root.name.len()));
                }
            }
        }
        best.map(|(i, rest, _)| (i, rest))
    }

    pub fn find_entry(&self, path: &str) -> Option<&Entry> {
        let (index, rest) = self.locate(path)?;
        let mut entry = &self.roots[index];
        for segment in paths::split(rest) {
            entry = entry.find_child(segment, self.case)?;
        }
        Some(entry)
    }

    pub fn find_entry_mut(&mut self, path: &str) -> Option<&mut Entry> {
        let case = self.case;
        let (index, rest) = self.locate(path)?;
        let mut entry = &mut self.roots[index];
        for segment in paths::split(rest) {
            entry = entry.find_child_mut(segment, case)?;
        }
        Some(entry)
    }

    pub fn get_entry(&self, path: &str) -> Result<&Entry> {
        self.find_entry(path).ok_or_else(|| HistoryError::not_found(path))
    }

    pub fn get_entry_mut(&mut self, path: &str) -> Result<&mut Entry> {
        self.find_entry_mut(path).ok_or_else(|| HistoryError::not_found(path))
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.find_entry(path).is_some()
    }

    pub fn id_path_of(&self, path: &str) -> Option<IdPath> {
        let (index, rest) = self.locate(path)?;
        let mut entry = &self.roots[index];
        let mut ids = vec![entry.id];
        for segment in paths::split(rest) {
            entry = entry.find_child(segment, self.case)?;
            ids.push(entry.id);
        }
        Some(IdPath::new(&ids))
    }

    /// Path of the entry's parent; `None` for roots and unknown paths
    pub fn parent_path(&self, path: &str) -> Option<String> {
        let (index, rest) = self.locate(path)?;
        if paths::split(rest).next().is_none() {
            return None;
        }
        let root = &self.roots[index].name;
        let parent = paths::parent_of(rest).map_or_else(|| root.clone(), |p| paths::appended(root, p));
        Some(parent)
    }

    pub fn is_root(&self, path: &str) -> bool {
        self.roots.iter().any(|r| self.case.names_equal(&r.name, path))
    }

    /// Find an entry by id anywhere in the tree, with its current path
    pub fn find_by_id(&self, id: EntryId) -> Option<(String, &Entry)> {
        self.roots.iter().find_map(|r| r.find_by_id(id, &r.name))
    }

    pub fn path_of_id(&self, id: EntryId) -> Option<String> {
        self.find_by_id(id).map(|(path, _)| path)
    }

    /// Add `entry` under the directory at `parent`, or as a new root when
    /// `parent` is `None`. Returns the id path of the added entry.
    pub fn add_entry(&mut self, parent: Option<&str>, entry: Entry) -> Result<IdPath> {
        let case = self.case;
        match parent {
            None => {
                if self.roots.iter().any(|r| case.names_equal(&r.name, &entry.name)) {
                    return Err(HistoryError::DuplicateEntry(entry.name));
                }
                let id_path = IdPath::new(&[entry.id]);
                self.roots.push(entry);
                Ok(id_path)
            }
            Some(parent_path) => {
                let parent_ids = self
                    .id_path_of(parent_path)
                    .ok_or_else(|| HistoryError::not_found(parent_path))?;
                let id = entry.id;
                self.get_entry_mut(parent_path)?
                    .add_child(entry, parent_path, case)?;
                Ok(parent_ids.appended_with(id))
            }
        }
    }

    /// Detach the entry at `path` (with its subtree) and hand it back
    pub fn remove_entry(&mut self, path: &str) -> Result<Entry> {
        let case = self.case;
        match self.parent_path(path) {
            None => {
                let index = self
                    .roots
                    .iter()
                    .position(|r| case.names_equal(&r.name, path))
                    .ok_or_else(|| HistoryError::not_found(path))?;
                Ok(self.roots.remove(index))
            }
            Some(parent_path) => self
                .get_entry_mut(&parent_path)?
                .remove_child(paths::name_of(path), case)
                .ok_or_else(|| HistoryError::not_found(path)),
        }
    }

    /// Rename the entry at `path`; returns the previous name
    pub fn rename_entry(&mut self, path: &str, new_name: &str) -> Result<String> {
        if let Some(reason) = paths::name_problem(new_name) {
            return Err(HistoryError::InvalidName {
                name: new_name.to_string(),
                reason,
            });
        }
        let new_path = paths::renamed(path, new_name);
        let id = self.get_entry(path)?.id;
        if let Some(existing) = self.find_entry(&new_path) {
            if existing.id != id {
                return Err(HistoryError::DuplicateEntry(new_path));
            }
        }
        let is_root = self.parent_path(path).is_none();
        let entry = self.get_entry_mut(path)?;
        let old_name = std::mem::replace(
            &mut entry.name,
            if is_root { new_path } else { new_name.to_string() },
        );
        Ok(old_name)
    }

    /// Move the entry at `path` under the directory at `new_parent`
    pub fn move_entry(&mut self, path: &str, new_parent: &str) -> Result<()> {
        let moved_ids = self.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
        if moved_ids.len() == 1 {
            return Err(HistoryError::InvalidMove {
                path: path.to_string(),
                reason: "roots cannot be moved",
            });
        }
        let target_ids = self
            .id_path_of(new_parent)
            .ok_or_else(|| HistoryError::not_found(new_parent))?;
        if target_ids.starts_with(&moved_ids) {
            return Err(HistoryError::InvalidMove {
                path: path.to_string(),
                reason: "cannot move an entry into itself",
            });
        }
        let target = self.get_entry(new_parent)?;
        if !target.is_directory() {
            return Err(HistoryError::InvalidMove {
                path: path.to_string(),
                reason: "target is not a directory",
            });
        }
        let name = paths::name_of(path);
        if target.find_child(name, self.case).is_some() {
            return Err(HistoryError::DuplicateEntry(paths::appended(new_parent, name)));
        }

        let entry = self.remove_entry(path)?;
        self.add_entry(Some(new_parent), entry)?;
        Ok(())
    }

    /// Directories that would have to be created for `path` to exist as a
    /// directory, parents first. Fails when a file is in the way.
    pub fn missing_directories(&self, path: &str) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        let mut current = String::new();
        if path.starts_with(paths::DELIMITER) {
            current.push(paths::DELIMITER);
        }
        for segment in paths::split(path) {
            current = if current.is_empty() || current == "/" {
                format!("{current}{segment}")
            } else {
                paths::appended(&current, segment)
            };
            if self.is_inside_root_name(&current) {
                continue;
            }
            match self.find_entry(&current) {
                Some(e) if e.is_directory() => {}
                Some(_) => {
                    return Err(HistoryError::InvalidMove {
                        path: current,
                        reason: "a file is in the way",
                    })
                }
                None => missing.push(current.clone()),
            }
        }
        Ok(missing)
    }

    /// True when `path` is a leading part of some root's name, e.g. `c:`
    /// for the root `c:/project`
    fn is_inside_root_name(&self, path: &str) -> bool {
        self.roots
            .iter()
            .any(|r| r.name.len() > path.len() && self.case.starts_with(&r.name, path))
    }

    /// Path of the directory a new entry at `path` would be attached to, or
    /// `None` when it would become a new root. The directory itself may not
    /// exist yet.
    pub fn parent_for_new(&self, path: &str) -> Option<String> {
        let (index, rest) = self.locate(path)?;
        let root = &self.roots[index].name;
        Some(paths::parent_of(rest).map_or_else(|| root.clone(), |p| paths::appended(root, p)))
    }

    /// Call `f` for every entry, parents first
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&str, &'a Entry)) {
        for root in &self.roots {
            root.walk(&root.name, f);
        }
    }

    pub fn stored_content_ids(&self) -> AHashSet<StoredId> {
        let mut out = AHashSet::new();
        for root in &self.roots {
            root.collect_stored_ids(&mut out);
        }
        out
    }

    /// Highest id used anywhere in the tree
    pub fn max_id(&self) -> Option<EntryId> {
        let mut max = None;
        self.walk(&mut |_, e| max = Some(max.map_or(e.id, |m: EntryId| m.max(e.id))));
        max
    }
}

impl Default for RootEntry {
    fn default() -> Self {
        Self::new(CaseSensitivity::platform_default())
    }
}

/// How an entry differs between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceKind {
    Created,
    Deleted,
    Modified,
}

/// One differing entry between two snapshots, matched by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub kind: DifferenceKind,
    /// Path on the newer side, or the older side for deletions
    pub path: String,
    pub left: Option<Entry>,
    pub right: Option<Entry>,
}

impl Difference {
    /// Differences between two snapshots of the same tree, parents first
    pub fn between(left: &RootEntry, right: &RootEntry) -> Vec<Difference> {
        let mut out = Vec::new();
        let mut left_ids = AHashSet::new();
        left.walk(&mut |_, e| {
            left_ids.insert(e.id);
        });
        let mut right_ids = AHashSet::new();
        right.walk(&mut |_, e| {
            right_ids.insert(e.id);
        });

        right.walk(&mut |path, e| {
            if !left_ids.contains(&e.id) {
                out.push(Difference::created(path, e));
                return;
            }
            if let Some((left_path, old)) = left.find_by_id(e.id) {
                if old.name != e.name || left_path != path || !same_file_state(old, e) {
                    out.push(Difference {
                        kind: DifferenceKind::Modified,
                        path: path.to_string(),
                        left: Some(shallow(old)),
                        right: Some(shallow(e)),
                    });
                }
            }
        });
        left.walk(&mut |path, e| {
            if !right_ids.contains(&e.id) {
                out.push(Difference {
                    kind: DifferenceKind::Deleted,
                    path: path.to_string(),
                    left: Some(shallow(e)),
                    right: None,
                });
            }
        });
        out
    }

    fn created(path: &str, e: &Entry) -> Self {
        Self {
            kind: DifferenceKind::Created,
            path: path.to_string(),
            left: None,
            right: Some(shallow(e)),
        }
    }

    pub fn is_file(&self) -> bool {
        self.left.as_ref().or(self.right.as_ref()).map_or(false, |e| !e.is_directory())
    }
}

fn same_file_state(a: &Entry, b: &Entry) -> bool {
    match (&a.kind, &b.kind) {
        (
            EntryKind::File {
                content: ca,
                read_only: ra,
                ..
            },
            EntryKind::File {
                content: cb,
                read_only: rb,
                ..
            },
        ) => ca == cb && ra == rb,
        (EntryKind::Directory { .. }, EntryKind::Directory { .. }) => true,
        _ => false,
    }
}

/// Copy of an entry without its children
fn shallow(e: &Entry) -> Entry {
    match &e.kind {
        EntryKind::Directory { .. } => Entry::directory(e.id, &e.name),
        EntryKind::File { .. } => e.clone(),
    }
}
