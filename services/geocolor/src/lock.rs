//! Single-run mutual exclusion through a pid file.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// What the lock currently records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held(u32),
    /// The lock exists but its contents are not a pid
    Corrupt(String),
}

/// A presence-based run lock.
pub trait RunLock: Send + Sync {
    /// Take the lock for `pid`. Returns false when it is already held.
    fn acquire(&self, pid: u32) -> std::io::Result<bool>;

    /// Release the lock if it still records `pid`.
    fn release(&self, pid: u32) -> std::io::Result<()>;

    /// Remove the lock whoever holds it.
    fn force_release(&self) -> std::io::Result<()>;

    fn holder(&self) -> std::io::Result<LockState>;
}

/// Lock file containing the holder's pid as plain text.
#[derive(Debug, Clone)]
pub struct PidFileLock {
    path: PathBuf,
}

impl PidFileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLock for PidFileLock {
    fn acquire(&self, pid: u32) -> std::io::Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e),
        };
        write!(file, "{}", pid)?;
        file.sync_all()?;
        debug!(path = %self.path.display(), pid, "Lock acquired");
        Ok(true)
    }

    fn release(&self, pid: u32) -> std::io::Result<()> {
        match self.holder()? {
            LockState::Held(holder) if holder == pid => self.force_release(),
            LockState::Free => Ok(()),
            other => {
                warn!(
                    path = %self.path.display(),
                    pid,
                    state = ?other,
                    "Lock not ours, leaving it"
                );
                Ok(())
            }
        }
    }

    fn force_release(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn holder(&self) -> std::io::Result<LockState> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(match text.trim().parse::<u32>() {
                Ok(pid) => LockState::Held(pid),
                Err(_) => LockState::Corrupt(text),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LockState::Free),
            Err(e) => Err(e),
        }
    }
}

/// Releases the lock when dropped.
pub struct LockGuard<'a> {
    lock: &'a dyn RunLock,
    pid: u32,
}

impl<'a> LockGuard<'a> {
    /// Acquire `lock` for `pid`, or `None` when another run holds it.
    pub fn try_acquire(lock: &'a dyn RunLock, pid: u32) -> std::io::Result<Option<Self>> {
        if lock.acquire(pid)? {
            Ok(Some(Self { lock, pid }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release(self.pid) {
            warn!(pid = self.pid, error = %e, "Failed to release lock");
        }
    }
}
