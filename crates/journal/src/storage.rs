//! Everything a [`LocalVcs`](crate::LocalVcs) persists, bundled

use crate::journal::{ChangeListStorage, InMemoryChangeListStorage, SledChangeListStorage};
use lh_core::{ContentStorage, FileContentStorage, Memento, MemoryContentStorage, Result, Store};
use parking_lot::RwLock;
use std::sync::Arc;

/// Where the saved memento goes
#[derive(Clone)]
enum MementoSlot {
    /// Encoded memento held in memory
    Memory(Arc<RwLock<Option<Vec<u8>>>>),
    Disk(Store),
}

/// Content blobs, change list blocks and the memento slot.
///
/// Clones share the same underlying storage, so an in-memory `Storage` can
/// be handed to a second `LocalVcs` to simulate a reopen.
#[derive(Clone)]
pub struct Storage {
    content: Arc<dyn ContentStorage>,
    changes: Arc<dyn ChangeListStorage>,
    memento: MementoSlot,
}

impl Storage {
    pub fn in_memory() -> Self {
        Self {
            content: Arc::new(MemoryContentStorage::new()),
            changes: Arc::new(InMemoryChangeListStorage::new()),
            memento: MementoSlot::Memory(Arc::new(RwLock::new(None))),
        }
    }

    /// Storage inside an initialized `.lh/` directory
    pub fn open(store: &Store) -> Result<Self> {
        Ok(Self {
            content: Arc::new(FileContentStorage::open(&store.content_dir(), &store.tmp_dir())?),
            changes: Arc::new(SledChangeListStorage::open(&store.changes_dir())?),
            memento: MementoSlot::Disk(store.clone()),
        })
    }

    /// Throw away the blocks, contents and memento under `store` and open
    /// empty storage in their place
    pub fn recreate(store: &Store) -> Result<Self> {
        for dir in [store.changes_dir(), store.content_dir()] {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            std::fs::create_dir_all(&dir)?;
        }
        match std::fs::remove_file(store.memento_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Self::open(store)
    }

    pub fn content(&self) -> Arc<dyn ContentStorage> {
        self.content.clone()
    }

    pub fn change_list_storage(&self) -> Box<dyn ChangeListStorage> {
        Box::new(self.changes.clone())
    }

    pub fn load_memento(&self) -> Result<Option<Memento>> {
        match &self.memento {
            MementoSlot::Memory(slot) => slot.read().as_deref().map(Memento::decode).transpose(),
            MementoSlot::Disk(store) => store.read_memento(),
        }
    }

    pub fn save_memento(&self, memento: &Memento) -> Result<()> {
        match &self.memento {
            MementoSlot::Memory(slot) => {
                *slot.write() = Some(memento.encode()?);
                Ok(())
            }
            MementoSlot::Disk(store) => store.write_memento(memento),
        }
    }

    pub fn clear_memento(&self) -> Result<()> {
        match &self.memento {
            MementoSlot::Memory(slot) => {
                *slot.write() = None;
                Ok(())
            }
            MementoSlot::Disk(store) => match std::fs::remove_file(store.memento_path()) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Remove every stored blob
    pub fn clear_content(&self) -> Result<()> {
        for id in self.content.ids() {
            self.content.remove(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_core::{CaseSensitivity, RootEntry};

    fn memento() -> Memento {
        Memento {
            root: RootEntry::new(CaseSensitivity::Sensitive),
            next_entry_id: 3,
            next_change_id: 7,
            last_change_set_id: Some(6),
        }
    }

    #[test]
    fn test_clones_share_memento() {
        let storage = Storage::in_memory();
        let other = storage.clone();
        storage.save_memento(&memento()).unwrap();
        assert_eq!(other.load_memento().unwrap(), Some(memento()));
        other.clear_memento().unwrap();
        assert_eq!(storage.load_memento().unwrap(), None);
    }

    #[test]
    fn test_disk_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        let storage = Storage::open(&store).unwrap();
        let id = storage.content().store(b"bytes").unwrap();
        storage.save_memento(&memento()).unwrap();
        assert_eq!(storage.load_memento().unwrap(), Some(memento()));

        storage.clear_content().unwrap();
        assert!(storage.content().load(id).is_err());
        storage.clear_memento().unwrap();
        storage.clear_memento().unwrap();
        assert!(!store.memento_path().exists());
    }

    #[test]
    fn test_recreate_drops_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        {
            let storage = Storage::open(&store).unwrap();
            storage.content().store(b"bytes").unwrap();
            storage.save_memento(&memento()).unwrap();
        }
        let storage = Storage::recreate(&store).unwrap();
        assert!(storage.content().ids().is_empty());
        assert_eq!(storage.load_memento().unwrap(), None);
        assert!(storage.change_list_storage().read_previous(None).unwrap().is_none());
    }
}
