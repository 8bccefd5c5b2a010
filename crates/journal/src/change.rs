//! Changes: single recorded mutations of the entry tree
//!
//! A change is built with what the caller asked for, then [`Change::apply_to`]
//! performs it on the live tree and captures whatever prior state is needed
//! to take it back. [`Change::revert_on`] takes it back, and is only valid on
//! the tree exactly as the change left it (changes are reverted newest first).

use ahash::AHashSet;
use lh_core::paths;
use lh_core::{Content, Entry, EntryId, EntryKind, HistoryError, IdPath, Result, RootEntry, StoredId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Changes and change sets draw ids from one counter
pub type ChangeId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    CreateFile {
        path: String,
        entry_id: EntryId,
        content: Content,
        file_timestamp: i64,
        read_only: bool,
    },
    CreateDirectory {
        path: String,
        entry_id: EntryId,
    },
    Rename {
        path: String,
        new_name: String,
        old_name: Option<String>,
    },
    Move {
        path: String,
        new_parent: String,
        old_parent: Option<String>,
    },
    ContentChange {
        path: String,
        content: Content,
        file_timestamp: i64,
        old: Option<(Content, i64)>,
    },
    ROStatusChange {
        path: String,
        read_only: bool,
        old_read_only: Option<bool>,
    },
    Delete {
        path: String,
        removed: Option<Entry>,
    },
    PutLabel {
        name: String,
        scope: Option<String>,
    },
    PutSystemLabel {
        name: String,
        scope: Option<String>,
        color: i32,
    },
}

impl ChangeKind {
    pub fn rename(path: &str, new_name: &str) -> Self {
        Self::Rename {
            path: path.to_string(),
            new_name: new_name.to_string(),
            old_name: None,
        }
    }

    pub fn move_to(path: &str, new_parent: &str) -> Self {
        Self::Move {
            path: path.to_string(),
            new_parent: new_parent.to_string(),
            old_parent: None,
        }
    }

    pub fn content_change(path: &str, content: Content, file_timestamp: i64) -> Self {
        Self::ContentChange {
            path: path.to_string(),
            content,
            file_timestamp,
            old: None,
        }
    }

    pub fn read_only(path: &str, read_only: bool) -> Self {
        Self::ROStatusChange {
            path: path.to_string(),
            read_only,
            old_read_only: None,
        }
    }

    pub fn delete(path: &str) -> Self {
        Self::Delete {
            path: path.to_string(),
            removed: None,
        }
    }

    /// Path the change was issued against; `None` for labels
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::CreateFile { path, .. }
            | Self::CreateDirectory { path, .. }
            | Self::Rename { path, .. }
            | Self::Move { path, .. }
            | Self::ContentChange { path, .. }
            | Self::ROStatusChange { path, .. }
            | Self::Delete { path, .. } => Some(path),
            Self::PutLabel { .. } | Self::PutSystemLabel { .. } => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFile { path, .. } => write!(f, "create file {path}"),
            Self::CreateDirectory { path, .. } => write!(f, "create directory {path}"),
            Self::Rename { path, new_name, .. } => write!(f, "rename {path} to {new_name}"),
            Self::Move {
                path, new_parent, ..
            } => write!(f, "move {path} to {new_parent}"),
            Self::ContentChange { path, .. } => write!(f, "change content of {path}"),
            Self::ROStatusChange {
                path, read_only, ..
            } => write!(f, "set {path} read-only={read_only}"),
            Self::Delete { path, .. } => write!(f, "delete {path}"),
            Self::PutLabel { name, .. } => write!(f, "label '{name}'"),
            Self::PutSystemLabel { name, .. } => write!(f, "system label '{name}'"),
        }
    }
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub timestamp: i64,
    pub kind: ChangeKind,
    /// Id paths this change touched, captured when applied
    affected: Vec<IdPath>,
}

impl Change {
    pub fn new(id: ChangeId, timestamp: i64, kind: ChangeKind) -> Self {
        Self {
            id,
            timestamp,
            kind,
            affected: Vec::new(),
        }
    }

    pub fn affected(&self) -> &[IdPath] {
        &self.affected
    }

    pub fn is_label(&self) -> bool {
        matches!(
            self.kind,
            ChangeKind::PutLabel { .. } | ChangeKind::PutSystemLabel { .. }
        )
    }

    pub fn is_structural(&self) -> bool {
        !self.is_label()
    }

    /// Name and scope for label changes
    pub fn label(&self) -> Option<(&str, Option<&str>)> {
        match &self.kind {
            ChangeKind::PutLabel { name, scope } | ChangeKind::PutSystemLabel { name, scope, .. } => {
                Some((name, scope.as_deref()))
            }
            _ => None,
        }
    }

    /// True when the change touched `id_path`, one of its ancestors, or one
    /// of its descendants
    pub fn affects(&self, id_path: &IdPath) -> bool {
        self.affected.iter().any(|p| p.is_child_or_parent_of(id_path))
    }

    /// Stored blobs this change keeps alive, including captured old state
    pub fn collect_stored_ids(&self, out: &mut AHashSet<StoredId>) {
        let mut add = |content: &Content| {
            if let Some(id) = content.stored_id() {
                out.insert(id);
            }
        };
        match &self.kind {
            ChangeKind::CreateFile { content, .. } => add(content),
            ChangeKind::ContentChange { content, old, .. } => {
                add(content);
                if let Some((old_content, _)) = old {
                    add(old_content);
                }
            }
            ChangeKind::Delete {
                removed: Some(entry),
                ..
            } => entry.collect_stored_ids(out),
            _ => {}
        }
    }

    /// Perform the change on `root`, capturing what is needed to revert it.
    /// On error the tree is left untouched.
    pub fn apply_to(&mut self, root: &mut RootEntry) -> Result<()> {
        let affected = match &mut self.kind {
            ChangeKind::CreateFile {
                path,
                entry_id,
                content,
                file_timestamp,
                read_only,
            } => {
                let (parent, name) = placement(root, path, false)?;
                let entry = Entry::file(*entry_id, &name, content.clone(), *file_timestamp, *read_only);
                vec![root.add_entry(parent.as_deref(), entry)?]
            }
            ChangeKind::CreateDirectory { path, entry_id } => {
                let (parent, name) = placement(root, path, true)?;
                vec![root.add_entry(parent.as_deref(), Entry::directory(*entry_id, &name))?]
            }
            ChangeKind::Rename {
                path,
                new_name,
                old_name,
            } => {
                let id_path = root.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
                let previous = root.rename_entry(path, new_name)?;
                *old_name = Some(paths::name_of(&previous).to_string());
                vec![id_path]
            }
            ChangeKind::Move {
                path,
                new_parent,
                old_parent,
            } => {
                let before = root.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
                let parent = root.parent_path(path).ok_or_else(|| HistoryError::InvalidMove {
                    path: path.clone(),
                    reason: "roots cannot be moved",
                })?;
                root.move_entry(path, new_parent)?;
                *old_parent = Some(parent);
                let moved = paths::appended(new_parent, paths::name_of(path));
                let after = root
                    .id_path_of(&moved)
                    .ok_or_else(|| inconsistent(&moved, "moved entry vanished"))?;
                vec![before, after]
            }
            ChangeKind::ContentChange {
                path,
                content,
                file_timestamp,
                old,
            } => {
                let id_path = root.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
                let (old_content, old_timestamp) = file_state(root.get_entry_mut(path)?, path)?;
                *old = Some((
                    std::mem::replace(old_content, content.clone()),
                    std::mem::replace(old_timestamp, *file_timestamp),
                ));
                vec![id_path]
            }
            ChangeKind::ROStatusChange {
                path,
                read_only,
                old_read_only,
            } => {
                let id_path = root.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
                let entry = root.get_entry_mut(path)?;
                let EntryKind::File { read_only: flag, .. } = &mut entry.kind else {
                    return Err(HistoryError::NotAFile(path.clone()));
                };
                *old_read_only = Some(std::mem::replace(flag, *read_only));
                vec![id_path]
            }
            ChangeKind::Delete { path, removed } => {
                let id_path = root.id_path_of(path).ok_or_else(|| HistoryError::not_found(path))?;
                *removed = Some(root.remove_entry(path)?);
                vec![id_path]
            }
            ChangeKind::PutLabel { .. } | ChangeKind::PutSystemLabel { .. } => Vec::new(),
        };
        self.affected = affected;
        Ok(())
    }

    /// Undo this change on the tree it produced
    pub fn revert_on(&self, root: &mut RootEntry) -> Result<()> {
        match &self.kind {
            ChangeKind::CreateFile { path, entry_id, .. }
            | ChangeKind::CreateDirectory { path, entry_id } => {
                let found = root.find_entry(path).map(|e| e.id);
                if found != Some(*entry_id) {
                    return Err(inconsistent(path, "created entry is not in place"));
                }
                root.remove_entry(path).map_err(|e| inconsistent(path, e))?;
            }
            ChangeKind::Rename {
                path,
                new_name,
                old_name,
            } => {
                let old_name = old_name.as_deref().ok_or_else(|| not_applied(path))?;
                let current = paths::renamed(path, new_name);
                root.rename_entry(&current, old_name)
                    .map_err(|e| inconsistent(&current, e))?;
            }
            ChangeKind::Move {
                path,
                new_parent,
                old_parent,
            } => {
                let old_parent = old_parent.as_deref().ok_or_else(|| not_applied(path))?;
                let current = paths::appended(new_parent, paths::name_of(path));
                root.move_entry(&current, old_parent)
                    .map_err(|e| inconsistent(&current, e))?;
            }
            ChangeKind::ContentChange { path, old, .. } => {
                let (content, timestamp) = old.as_ref().ok_or_else(|| not_applied(path))?;
                let entry = root.get_entry_mut(path).map_err(|e| inconsistent(path, e))?;
                let (current_content, current_timestamp) =
                    file_state(entry, path).map_err(|e| inconsistent(path, e))?;
                *current_content = content.clone();
                *current_timestamp = *timestamp;
            }
            ChangeKind::ROStatusChange {
                path,
                old_read_only,
                ..
            } => {
                let old_flag = old_read_only.ok_or_else(|| not_applied(path))?;
                let entry = root.get_entry_mut(path).map_err(|e| inconsistent(path, e))?;
                let EntryKind::File { read_only, .. } = &mut entry.kind else {
                    return Err(inconsistent(path, "read-only flag set on a directory"));
                };
                *read_only = old_flag;
            }
            ChangeKind::Delete { path, removed } => {
                let removed = removed.clone().ok_or_else(|| not_applied(path))?;
                let was_root = root.case().names_equal(&removed.name, path);
                let parent = if was_root { None } else { paths::parent_of(path) };
                root.add_entry(parent, removed)
                    .map_err(|e| inconsistent(path, e))?;
            }
            ChangeKind::PutLabel { .. } | ChangeKind::PutSystemLabel { .. } => {}
        }
        Ok(())
    }
}

/// Where a new entry at `path` goes: its parent (or `None` for a new root)
/// and the name it is stored under
fn placement(root: &RootEntry, path: &str, directory: bool) -> Result<(Option<String>, String)> {
    if root.has_entry(path) {
        return Err(HistoryError::DuplicateEntry(path.to_string()));
    }
    match root.parent_for_new(path) {
        Some(parent) => Ok((Some(parent), paths::name_of(path).to_string())),
        None if directory || paths::parent_of(path).is_none() => Ok((None, path.to_string())),
        None => Err(HistoryError::not_found(paths::parent_of(path).unwrap_or(path))),
    }
}

fn file_state<'a>(entry: &'a mut Entry, path: &str) -> Result<(&'a mut Content, &'a mut i64)> {
    match &mut entry.kind {
        EntryKind::File {
            content, timestamp, ..
        } => Ok((content, timestamp)),
        EntryKind::Directory { .. } => Err(HistoryError::NotAFile(path.to_string())),
    }
}

fn inconsistent(path: &str, cause: impl fmt::Display) -> HistoryError {
    HistoryError::Inconsistent(format!("{path}: {cause}"))
}

fn not_applied(path: &str) -> HistoryError {
    inconsistent(path, "change was never applied")
}
