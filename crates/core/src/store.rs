//! On-disk layout of a history directory

use crate::error::HistoryError;
use crate::hash::checksum;
use crate::id_path::EntryId;
use crate::tree::RootEntry;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Name of the history directory inside a tracked project
pub const HISTORY_DIR: &str = ".lh";

/// Snapshot of the live tree plus the id counters, saved so that a reload
/// does not have to replay the whole change log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memento {
    pub root: RootEntry,
    pub next_entry_id: EntryId,
    pub next_change_id: i64,
    /// Last change set already reflected in `root`
    pub last_change_set_id: Option<i64>,
}

const MEMENTO_MAGIC: [u8; 4] = *b"LHM1";

impl Memento {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let sum = checksum(&[&payload]);
        let mut out = Vec::with_capacity(4 + 32 + payload.len());
        out.extend_from_slice(&MEMENTO_MAGIC);
        out.extend_from_slice(sum.as_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < 36 || raw[..4] != MEMENTO_MAGIC {
            return Err(HistoryError::BrokenStorage("memento header is damaged".into()));
        }
        let payload = &raw[36..];
        if checksum(&[payload]).as_bytes()[..] != raw[4..36] {
            return Err(HistoryError::BrokenStorage("memento failed its checksum".into()));
        }
        bincode::deserialize(payload)
            .map_err(|e| HistoryError::BrokenStorage(format!("memento is undecodable: {e}")))
    }
}

/// Paths of everything kept under `.lh/`:
/// ```text
/// .lh/
///   config.toml
///   memento.bin
///   content/     one file per stored blob
///   changes/     change list blocks (sled)
///   locks/
///     write.lock
///   tmp/
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    /// Root of the tracked project
    root: PathBuf,
    /// Path to the .lh directory
    lh_dir: PathBuf,
}

impl Store {
    /// Create the layout under `project_root`. Fails if it already exists.
    pub fn init(project_root: &Path) -> Result<Self> {
        let lh_dir = project_root.join(HISTORY_DIR);
        if lh_dir.exists() {
            return Err(HistoryError::DuplicateEntry(format!(
                "{} (history already initialized)",
                lh_dir.display()
            )));
        }
        let store = Self {
            root: project_root.to_path_buf(),
            lh_dir,
        };
        store.create_layout()?;
        debug!("Initialized history store at {}", store.lh_dir.display());
        Ok(store)
    }

    /// Open an existing layout under `project_root`
    pub fn open(project_root: &Path) -> Result<Self> {
        let lh_dir = project_root.join(HISTORY_DIR);
        if !lh_dir.is_dir() {
            return Err(HistoryError::not_found(&lh_dir.display().to_string()));
        }
        let store = Self {
            root: project_root.to_path_buf(),
            lh_dir,
        };
        store.create_layout()?;
        Ok(store)
    }

    fn create_layout(&self) -> Result<()> {
        for dir in [self.content_dir(), self.changes_dir(), self.locks_dir(), self.tmp_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lh_dir(&self) -> &Path {
        &self.lh_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.lh_dir.join("config.toml")
    }

    pub fn memento_path(&self) -> PathBuf {
        self.lh_dir.join("memento.bin")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.lh_dir.join("content")
    }

    pub fn changes_dir(&self) -> PathBuf {
        self.lh_dir.join("changes")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.lh_dir.join("locks")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.lh_dir.join("tmp")
    }

    /// Read the saved memento; `Ok(None)` when nothing was saved yet
    pub fn read_memento(&self) -> Result<Option<Memento>> {
        match fs::read(self.memento_path()) {
            Ok(raw) => Memento::decode(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_memento(&self, memento: &Memento) -> Result<()> {
        atomic_write(&self.tmp_dir(), &self.memento_path(), &memento.encode()?)
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, then renames it to the target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(tmp_dir)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_dir.join(format!(
        "{}-{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CaseSensitivity;
    use crate::tree::Entry;

    fn memento() -> Memento {
        let mut root = RootEntry::new(CaseSensitivity::Sensitive);
        root.add_entry(None, Entry::directory(1, "dir")).unwrap();
        Memento {
            root,
            next_entry_id: 2,
            next_change_id: 5,
            last_change_set_id: Some(4),
        }
    }

    #[test]
    fn test_store_init() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        assert!(store.content_dir().is_dir());
        assert!(store.changes_dir().is_dir());
        assert!(store.locks_dir().is_dir());
        assert!(store.tmp_dir().is_dir());

        assert!(Store::init(temp_dir.path()).is_err());
        assert!(Store::open(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_open_missing_store_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Store::open(temp_dir.path()),
            Err(HistoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tmp = temp_dir.path().join("tmp");
        let target = temp_dir.path().join("out/file.bin");

        atomic_write(&tmp, &target, b"payload").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"payload");
        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_memento_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        assert_eq!(store.read_memento().unwrap(), None);

        store.write_memento(&memento()).unwrap();
        assert_eq!(store.read_memento().unwrap(), Some(memento()));
    }

    #[test]
    fn test_damaged_memento_is_broken_storage() {
        let mut raw = memento().encode().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x55;
        assert!(matches!(
            Memento::decode(&raw),
            Err(HistoryError::BrokenStorage(_))
        ));
        assert!(matches!(
            Memento::decode(b"nope"),
            Err(HistoryError::BrokenStorage(_))
        ));
    }
}
