//! Write serialization for the cache store.
//!
//! Every write runs while a [`WriteGuard`] from the store's [`WriteLock`] is
//! alive. The guard releases on drop, on every exit path.
//!
//! [`NoLock`] is the default. It adds no cross-process coordination: two
//! independent processes writing the same file without a real lock race
//! each other, and that is the caller's responsibility. Within one process
//! the store's own connection mutex already serializes writes.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};

/// Lock acquisition failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    #[error("failed to acquire write lock: {0}")]
    Acquire(String),
}

/// Scoped proof that the write lock is held.
pub struct WriteGuard<'a> {
    release: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> WriteGuard<'a> {
    /// A guard that runs `release` exactly once when dropped.
    pub fn new(release: impl FnOnce() + 'a) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// A guard that holds nothing.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard").field("held", &self.release.is_some()).finish()
    }
}

/// Serializes writers around the store's update-then-insert sequence.
pub trait WriteLock: Send + Sync + fmt::Debug {
    /// Block until the lock is held.
    ///
    /// # Errors
    ///
    /// Returns `LockError` if the lock cannot be acquired at all.
    fn acquire(&self) -> Result<WriteGuard<'_>, LockError>;
}

/// No coordination beyond what the store does in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

impl WriteLock for NoLock {
    fn acquire(&self) -> Result<WriteGuard<'_>, LockError> {
        Ok(WriteGuard::noop())
    }
}

/// A process-wide mutex, for sharing one lock between several store
/// handles inside a single process.
#[derive(Debug, Default)]
pub struct ProcessLock {
    inner: Mutex<()>,
}

impl ProcessLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WriteLock for ProcessLock {
    fn acquire(&self) -> Result<WriteGuard<'_>, LockError> {
        let guard = recover(&self.inner, "process_lock.acquire");
        Ok(WriteGuard::new(move || drop(guard)))
    }
}

/// An exclusive advisory lock on a file next to the cache, for several
/// processes sharing one cache location.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    local: Mutex<()>,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), local: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, LockError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| LockError::Acquire(format!("create {}: {e}", parent.display())))?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| LockError::Acquire(format!("open {}: {e}", self.path.display())))
    }
}

impl WriteLock for FileLock {
    fn acquire(&self) -> Result<WriteGuard<'_>, LockError> {
        let local = recover(&self.local, "file_lock.acquire");
        let file = self.open()?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| LockError::Acquire(format!("lock {}: {e}", self.path.display())))?;

        let path = self.path.as_path();
        Ok(WriteGuard::new(move || {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to release file lock");
            }
            drop(local);
        }))
    }
}

/// Which [`WriteLock`] a store should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteLockKind {
    #[default]
    None,
    Process,
    File,
}

fn recover<'a>(lock: &'a Mutex<()>, op: &'static str) -> MutexGuard<'a, ()> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(
                op,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned write lock"
            );
            poisoned.into_inner()
        }
    }
}
