//! Error type shared by the history crates

use thiserror::Error;

/// Errors surfaced by the entry tree, the stores and the change log
#[derive(Debug, Error)]
pub enum HistoryError {
    /// No entry exists at the given path
    #[error("entry not found: {0}")]
    NotFound(String),

    /// An entry already exists at the given path
    #[error("entry already exists: {0}")]
    DuplicateEntry(String),

    /// The entry exists but is a directory
    #[error("not a file: {0}")]
    NotAFile(String),

    /// A move or rename would break the tree (into itself, onto a file)
    #[error("invalid move of {path}: {reason}")]
    InvalidMove { path: String, reason: &'static str },

    /// A new name is not a single path segment
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A restore was asked to put an entry somewhere it cannot go
    #[error("cannot restore entry {id} at {path}: {reason}")]
    InvalidRestoreTarget {
        id: i64,
        path: String,
        reason: &'static str,
    },

    /// Persisted history could not be read back
    #[error("broken storage: {0}")]
    BrokenStorage(String),

    /// A change was reverted against a tree it was not recorded on
    #[error("inconsistent history: {0}")]
    Inconsistent(String),

    /// The change log database reported an error
    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

impl HistoryError {
    /// True for errors caused by the caller's arguments rather than by storage
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::DuplicateEntry(_)
                | Self::NotAFile(_)
                | Self::InvalidMove { .. }
                | Self::InvalidName { .. }
                | Self::InvalidRestoreTarget { .. }
        )
    }

    pub fn not_found(path: &str) -> Self {
        Self::NotFound(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        assert!(HistoryError::NotFound("a".into()).is_user_error());
        assert!(HistoryError::DuplicateEntry("a".into()).is_user_error());
        assert!(HistoryError::InvalidName {
            name: "a/b".into(),
            reason: "contains a path delimiter",
        }
        .is_user_error());
        assert!(!HistoryError::BrokenStorage("bad block".into()).is_user_error());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = HistoryError::DuplicateEntry("dir/file".into());
        assert_eq!(err.to_string(), "entry already exists: dir/file");
    }
}
