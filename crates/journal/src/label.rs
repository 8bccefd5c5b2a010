//! Labels: named points in history

use crate::change::{Change, ChangeId, ChangeKind};
use lh_core::{ContentStorage, Entry, HistoryError, Result, RootEntry};

/// Handle returned when a label is put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Id of the label change itself
    pub change_id: ChangeId,
    pub name: String,
    /// Key or path the label is limited to; `None` is visible everywhere
    pub scope: Option<String>,
    /// Set for system labels only
    pub color: Option<i32>,
}

impl Label {
    /// The label a change put, if it is a label change
    pub fn from_change(change: &Change) -> Option<Self> {
        let (name, scope, color) = match &change.kind {
            ChangeKind::PutLabel { name, scope } => (name, scope, None),
            ChangeKind::PutSystemLabel { name, scope, color } => (name, scope, Some(*color)),
            _ => return None,
        };
        Some(Self {
            change_id: change.id,
            name: name.clone(),
            scope: scope.clone(),
            color,
        })
    }
}

/// What a path held at some point in history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteContent {
    pub is_directory: bool,
    /// `None` for directories and for content that was too large to keep
    pub bytes: Option<Vec<u8>>,
}

impl ByteContent {
    pub fn of(entry: &Entry, storage: &dyn ContentStorage) -> Result<Self> {
        match entry.content() {
            Some(content) => Ok(Self {
                is_directory: false,
                bytes: content.bytes(storage)?,
            }),
            None => Ok(Self {
                is_directory: true,
                bytes: None,
            }),
        }
    }
}

/// Revert `changes` (newest first) on `tree` until the change with
/// `change_id` is reached. Returns whether it was found; the change itself
/// is left applied.
pub fn revert_until<'a>(
    tree: &mut RootEntry,
    changes: impl IntoIterator<Item = &'a Change>,
    change_id: ChangeId,
) -> Result<bool> {
    for change in changes {
        if change.id == change_id {
            return Ok(true);
        }
        change.revert_on(tree)?;
    }
    Ok(false)
}

pub(crate) fn label_not_found(label: &Label) -> HistoryError {
    HistoryError::NotFound(format!("label '{}' (change {})", label.name, label.change_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use lh_core::{CaseSensitivity, Content, MemoryContentStorage};

    #[test]
    fn test_revert_until_stops_at_label() {
        let mut tree = RootEntry::new(CaseSensitivity::Sensitive);
        let mut changes = vec![
            Change::new(
                1,
                1,
                ChangeKind::CreateDirectory {
                    path: "dir".into(),
                    entry_id: 1,
                },
            ),
            Change::new(
                2,
                2,
                ChangeKind::PutLabel {
                    name: "here".into(),
                    scope: None,
                },
            ),
            Change::new(3, 3, ChangeKind::rename("dir", "renamed")),
        ];
        for change in &mut changes {
            change.apply_to(&mut tree).unwrap();
        }

        assert!(revert_until(&mut tree, changes.iter().rev(), 2).unwrap());
        assert!(tree.has_entry("dir"));
        assert!(!revert_until(&mut tree, changes[..1].iter(), 99).unwrap());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_label_from_change() {
        let change = Change::new(
            4,
            1,
            ChangeKind::PutSystemLabel {
                name: "build".into(),
                scope: Some("p".into()),
                color: 3,
            },
        );
        let label = Label::from_change(&change).unwrap();
        assert_eq!(label.change_id, 4);
        assert_eq!(label.color, Some(3));
        assert!(Label::from_change(&Change::new(5, 1, ChangeKind::delete("x"))).is_none());
    }

    #[test]
    fn test_byte_content_of_entries() {
        let storage = MemoryContentStorage::new();
        let content = Content::create(b"abc", &storage, 100).unwrap();
        let file = Entry::file(1, "f", content, 1, false);
        assert_eq!(
            ByteContent::of(&file, &storage).unwrap(),
            ByteContent {
                is_directory: false,
                bytes: Some(b"abc".to_vec()),
            }
        );
        let dir = Entry::directory(2, "d");
        assert!(ByteContent::of(&dir, &storage).unwrap().is_directory);
        let big = Entry::file(3, "big", Content::Unavailable, 1, false);
        assert_eq!(ByteContent::of(&big, &storage).unwrap().bytes, None);
    }
}
