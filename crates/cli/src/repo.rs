//! An opened repository: store, write lock and history

use crate::locks::WriteLock;
use crate::util;
use anyhow::{Context, Result};
use lh_core::Store;
use lh_journal::{LocalVcs, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Repo {
    pub store: Store,
    pub vcs: LocalVcs,
    /// Name of the history root holding the working tree
    root_name: String,
    _lock: WriteLock,
}

impl Repo {
    /// Open the repository containing the current directory
    pub fn find() -> Result<Self> {
        let repo_root = util::find_repo_root().context("Failed to find repository")?;
        Self::open(&repo_root)
    }

    pub fn open(repo_root: &Path) -> Result<Self> {
        let store = Store::open(repo_root).context("Failed to open history store")?;
        let lock = WriteLock::acquire(&store.locks_dir())?;
        let vcs = LocalVcs::open(&store, Arc::new(SystemClock)).context("Failed to load history")?;
        Ok(Self {
            root_name: root_name(repo_root),
            store,
            vcs,
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// History path of the working tree file at `path`, given relative to
    /// the current directory or absolute
    pub fn history_path(&self, path: &Path) -> Result<String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        self.history_path_of(&util::clean_path(&absolute))
    }

    /// History path of an absolute working tree path
    pub fn history_path_of(&self, absolute: &Path) -> Result<String> {
        let rel = util::relative_slash_path(self.root(), absolute)?;
        Ok(if rel.is_empty() {
            self.root_name.clone()
        } else {
            format!("{}/{}", self.root_name, rel)
        })
    }

    /// Working tree location of a history path
    pub fn disk_path(&self, history_path: &str) -> PathBuf {
        let rel = history_path
            .strip_prefix(self.root_name.as_str())
            .unwrap_or(history_path)
            .trim_start_matches('/');
        self.root().join(rel)
    }
}

/// The working tree is recorded under a root named after the project
/// directory
pub fn root_name(repo_root: &Path) -> String {
    repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "project".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_map_between_disk_and_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("proj");
        std::fs::create_dir_all(&root).unwrap();
        Store::init(&root).unwrap();

        let repo = Repo::open(&root).unwrap();
        assert_eq!(repo.root_name(), "proj");
        let history = repo.history_path_of(&root.join("src/main.rs")).unwrap();
        assert_eq!(history, "proj/src/main.rs");
        assert_eq!(repo.disk_path(&history), root.join("src/main.rs"));
        assert_eq!(repo.history_path_of(&root).unwrap(), "proj");
        assert!(repo.history_path(&root.join("../elsewhere")).is_err());
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let temp_dir = tempfile::tempdir().unwrap();
        Store::init(temp_dir.path()).unwrap();
        let _repo = Repo::open(temp_dir.path()).unwrap();
        assert!(Repo::open(temp_dir.path()).is_err());
    }
}
