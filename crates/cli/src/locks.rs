//! Single-writer lock over `.lh/`
//!
//! Every command opens history for writing, so two `lh` processes never
//! touch the same store at once. The lock is an advisory `flock` on
//! `locks/write.lock`, which also records who holds it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "write.lock";

/// Exclusive lock on one repository's history. Released when dropped.
pub struct WriteLock {
    path: PathBuf,
    _file: File,
}

/// Who holds the lock, stored as JSON in the lock file
#[derive(Debug, Serialize, Deserialize)]
struct Holder {
    pid: u32,
    started_at: i64,
}

impl Holder {
    fn this_process() -> Self {
        Self {
            pid: std::process::id(),
            started_at: lh_journal::Clock::now(&lh_journal::SystemClock),
        }
    }

    fn read(file: &mut File) -> Result<Self> {
        let mut text = String::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_string(&mut text)?;
        serde_json::from_str(&text).context("Lock file holds no valid holder")
    }

    fn write(&self, file: &mut File) -> Result<()> {
        let text = serde_json::to_string(self)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl WriteLock {
    /// Take the lock in `locks_dir`, failing at once if another process
    /// holds it
    pub fn acquire(locks_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(locks_dir).context("Failed to create locks directory")?;
        let path = locks_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        if !try_lock(&file)? {
            let holder = match Holder::read(&mut file) {
                Ok(holder) => format!("process {}", holder.pid),
                Err(_) => "another process".to_string(),
            };
            anyhow::bail!("History is locked by {}", holder);
        }

        Holder::this_process().write(&mut file)?;
        tracing::debug!("Acquired {}", path.display());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<bool> {
    use nix::errno::Errno;
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e).context("flock failed"),
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<bool> {
    Ok(true)
}
