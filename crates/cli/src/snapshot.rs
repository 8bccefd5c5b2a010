//! Recording the working tree into history
//!
//! A snapshot walks the directory, compares it with the live tree and
//! records the differences as one named change set.

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use lh_core::store::HISTORY_DIR;
use lh_core::{paths, Content, ContentFactory};
use lh_journal::LocalVcs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Ignore files read from the working tree root
const IGNORE_FILES: [&str; 2] = [".gitignore", ".lhignore"];

/// What a snapshot recorded
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub created: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl SnapshotReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }
}

/// File bytes read only when history asks for them
struct DiskFile {
    path: PathBuf,
    len: u64,
}

impl ContentFactory for DiskFile {
    fn len(&self) -> lh_core::Result<u64> {
        Ok(self.len)
    }

    fn bytes(&self) -> lh_core::Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }
}

/// Ignore rules for a working tree. `.lh/` and `.git/` are always skipped.
pub fn ignore_rules(work_dir: &Path) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(work_dir);
    for name in IGNORE_FILES {
        let file = work_dir.join(name);
        if file.is_file() {
            if let Some(e) = builder.add(&file) {
                tracing::warn!("Skipping bad rules in {}: {}", file.display(), e);
            }
        }
    }
    builder
        .add_line(None, &format!("/{}/", HISTORY_DIR))
        .and_then(|b| b.add_line(None, "/.git/"))
        .context("Failed to add built-in ignore rules")?;
    builder.build().context("Failed to build ignore rules")
}

/// Record the state of `work_dir` under the history root `root_name`, as
/// one change set called `name`
pub fn snapshot(
    vcs: &mut LocalVcs,
    work_dir: &Path,
    root_name: &str,
    rules: &Gitignore,
    name: &str,
) -> Result<SnapshotReport> {
    vcs.begin_change_set();
    let result = record_differences(vcs, work_dir, root_name, rules);
    vcs.end_change_set(Some(name))?;
    let report = result?;
    tracing::info!("Snapshot '{}' recorded {} changes", name, report.total());
    Ok(report)
}

fn record_differences(
    vcs: &mut LocalVcs,
    work_dir: &Path,
    root_name: &str,
    rules: &Gitignore,
) -> Result<SnapshotReport> {
    let mut report = SnapshotReport::default();
    let mut seen = HashSet::new();

    if !vcs.has_entry(root_name) {
        vcs.create_directory(root_name)?;
    }
    seen.insert(root_name.to_string());

    let walker = WalkDir::new(work_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !rules.matched(e.path(), e.file_type().is_dir()).is_ignore());

    for entry in walker {
        let entry = entry.context("Failed to walk working tree")?;
        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            continue;
        }
        let rel = crate::util::relative_slash_path(work_dir, entry.path())?;
        let path = paths::appended(root_name, &rel);
        seen.insert(path.clone());

        let existing = vcs.find_entry(&path).map(|e| e.is_directory());
        if file_type.is_dir() {
            match existing {
                Some(true) => {}
                Some(false) => {
                    vcs.delete(&path)?;
                    vcs.create_directory(&path)?;
                    report.modified.push(path);
                }
                None => {
                    vcs.create_directory(&path)?;
                    report.created.push(path);
                }
            }
            continue;
        }

        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata of {}", entry.path().display()))?;
        let timestamp = modified_millis(&metadata);
        let read_only = metadata.permissions().readonly();
        let file = DiskFile {
            path: entry.path().to_path_buf(),
            len: metadata.len(),
        };

        match existing {
            None => {
                vcs.create_file(&path, &file, timestamp, read_only)?;
                report.created.push(path);
            }
            Some(true) => {
                vcs.delete(&path)?;
                vcs.create_file(&path, &file, timestamp, read_only)?;
                report.modified.push(path);
            }
            Some(false) => {
                let Some(current) = vcs.find_entry(&path) else {
                    continue;
                };
                let had = current.content().cloned();
                let old_read_only = current.is_read_only();
                let unchanged_stamp = current.timestamp() == Some(timestamp)
                    && had.as_ref().and_then(Content::len) == Some(file.len);

                let mut changed = false;
                if !unchanged_stamp {
                    vcs.change_file_content(&path, &file, timestamp)?;
                    let after = vcs.find_entry(&path).and_then(|e| e.content().cloned());
                    changed = had != after || matches!(after, Some(Content::Unavailable));
                }
                if old_read_only != read_only {
                    vcs.set_read_only(&path, read_only)?;
                    changed = true;
                }
                if changed {
                    report.modified.push(path);
                }
            }
        }
    }

    for path in vanished(vcs, root_name, &seen) {
        vcs.delete(&path)?;
        report.deleted.push(path);
    }
    Ok(report)
}

/// Entries under `root_name` not seen on disk, without those whose parent
/// is already going
fn vanished(vcs: &LocalVcs, root_name: &str, seen: &HashSet<String>) -> Vec<String> {
    let case = vcs.root().case();
    let mut gone: Vec<String> = Vec::new();
    vcs.root().walk(&mut |path, _| {
        if !case.starts_with(path, root_name) || seen.contains(path) {
            return;
        }
        if gone.iter().any(|g| case.starts_with(path, g)) {
            return;
        }
        gone.push(path.to_string());
    });
    gone
}

fn modified_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_journal::{ManualClock, VcsConfig};
    use std::fs;
    use std::sync::Arc;

    fn vcs() -> LocalVcs {
        let config = VcsConfig {
            case_sensitive: Some(true),
            ..VcsConfig::default()
        };
        LocalVcs::in_memory(config, Arc::new(ManualClock::new(1)))
    }

    fn take(vcs: &mut LocalVcs, dir: &Path, name: &str) -> SnapshotReport {
        let rules = ignore_rules(dir).unwrap();
        snapshot(vcs, dir, "proj", &rules, name).unwrap()
    }

    #[test]
    fn test_first_snapshot_creates_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(temp_dir.path().join("README"), "hi").unwrap();

        let mut vcs = vcs();
        let report = take(&mut vcs, temp_dir.path(), "first");
        assert_eq!(report.created, vec!["proj/README", "proj/src", "proj/src/main.rs"]);
        assert_eq!(
            vcs.current_content("proj/src/main.rs").unwrap(),
            Some(b"fn main() {}".to_vec())
        );

        let sets: Vec<_> = vcs.change_sets().collect();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_unchanged_tree_records_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let mut vcs = vcs();
        take(&mut vcs, temp_dir.path(), "first");
        let report = take(&mut vcs, temp_dir.path(), "second");
        assert!(report.is_empty());
        assert_eq!(vcs.change_sets().count(), 1);
    }

    #[test]
    fn test_modify_and_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("dir/sub")).unwrap();
        fs::write(temp_dir.path().join("dir/sub/x"), "x").unwrap();
        fs::write(temp_dir.path().join("a.txt"), "one").unwrap();

        let mut vcs = vcs();
        take(&mut vcs, temp_dir.path(), "first");

        fs::remove_dir_all(temp_dir.path().join("dir")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "two, longer").unwrap();
        let report = take(&mut vcs, temp_dir.path(), "second");

        assert_eq!(report.modified, vec!["proj/a.txt"]);
        assert_eq!(report.deleted, vec!["proj/dir"]);
        assert!(!vcs.has_entry("proj/dir/sub/x"));
        assert_eq!(vcs.revisions_for("proj/a.txt").unwrap().len(), 2);
    }

    #[test]
    fn test_ignored_paths_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(".lhignore"), "*.log\nbuild/\n").unwrap();
        fs::write(temp_dir.path().join("app.log"), "noise").unwrap();
        fs::create_dir_all(temp_dir.path().join("build")).unwrap();
        fs::write(temp_dir.path().join("build/out"), "bin").unwrap();
        fs::create_dir_all(temp_dir.path().join(HISTORY_DIR)).unwrap();
        fs::write(temp_dir.path().join(HISTORY_DIR).join("memento.bin"), "m").unwrap();
        fs::write(temp_dir.path().join("kept.rs"), "").unwrap();

        let mut vcs = vcs();
        let report = take(&mut vcs, temp_dir.path(), "first");
        assert_eq!(report.created, vec!["proj/.lhignore", "proj/kept.rs"]);
    }

    #[test]
    fn test_file_replaced_by_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("thing"), "file").unwrap();
        let mut vcs = vcs();
        take(&mut vcs, temp_dir.path(), "first");

        fs::remove_file(temp_dir.path().join("thing")).unwrap();
        fs::create_dir_all(temp_dir.path().join("thing")).unwrap();
        let report = take(&mut vcs, temp_dir.path(), "second");
        assert_eq!(report.modified, vec!["proj/thing"]);
        assert!(vcs.find_entry("proj/thing").unwrap().is_directory());
    }
}
