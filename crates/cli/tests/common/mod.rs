//! Common utilities for integration tests

pub mod cli;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch project directory named `proj`
pub struct TestProject {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("proj");
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a file relative to the project root, creating parents
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        std::fs::remove_file(self.root.join(rel))?;
        Ok(())
    }
}
