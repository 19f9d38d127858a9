//! Store handle: opening, pragma configuration and shutdown.
//!
//! The table lives in one SQLite file in WAL mode with `synchronous=NORMAL`:
//! readers never block the writer, and a crash can lose the last few
//! commits. A lost cache row only means a refetch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::lock::{NoLock, WriteLock};
use super::migrations;
use crate::Error;
use crate::config::CacheConfig;

/// Persistent response cache backed by a single SQLite table.
///
/// One connection is owned for the lifetime of the handle and guarded by a
/// mutex, so the handle can be shared across threads behind an `Arc`.
/// Writes additionally hold the injected [`WriteLock`]; reads never do.
#[derive(Debug)]
pub struct HttpCacheStore {
    conn: Mutex<Connection>,
    pub(crate) write_lock: Arc<dyn WriteLock>,
    location: Option<PathBuf>,
}

impl HttpCacheStore {
    /// Open (or create) a store at `location` with no cross-process lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::Open` if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(location: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with_lock(location, Arc::new(NoLock))
    }

    /// Open (or create) a store at `location`, serializing writes with `write_lock`.
    ///
    /// Missing parent directories are created. Schema creation runs under the
    /// write lock, so concurrent first opens of one file do not race the DDL.
    /// Opening an existing store leaves its schema untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::Open` if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open_with_lock(location: impl AsRef<Path>, write_lock: Arc<dyn WriteLock>) -> Result<Self, Error> {
        let location = location.as_ref();

        if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::open(location, e))?;
        }

        let conn = Connection::open(location).map_err(|e| Error::open(location, e))?;
        let store = Self::prepare(conn, write_lock, Some(location.to_path_buf()))?;

        tracing::info!(location = %location.display(), "opened http cache");
        Ok(store)
    }

    /// Open the store described by `config`, including its write lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::Open` if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open_with_config(config: &CacheConfig) -> Result<Self, Error> {
        Self::open_with_lock(&config.cache_location, config.build_write_lock())
    }

    /// Open an in-memory store for testing.
    ///
    /// Creates a private in-memory SQLite database with the same
    /// pragma configuration and schema as file-based stores.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|e| Error::open(":memory:", e))?;
        Self::prepare(conn, Arc::new(NoLock), None)
    }

    fn prepare(mut conn: Connection, write_lock: Arc<dyn WriteLock>, location: Option<PathBuf>) -> Result<Self, Error> {
        let shown = location.clone().unwrap_or_else(|| PathBuf::from(":memory:"));

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| Error::open(&shown, e))?;
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| Error::open(&shown, e))?;
        tracing::debug!(location = %shown.display(), journal_mode, "applied pragmas");

        {
            let _guard = write_lock.acquire().map_err(|e| Error::open(&shown, e))?;
            migrations::run(&mut conn).map_err(|e| Error::open(&shown, e))?;
        }

        Ok(Self { conn: Mutex::new(conn), write_lock, location })
    }

    /// Backing file, or `None` for an in-memory store.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Checkpoint the write-ahead log and release the connection.
    ///
    /// Every write has already committed, so dropping the store without
    /// calling this loses nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the checkpoint or close fails.
    pub fn close(self) -> Result<(), Error> {
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
        conn.close().map_err(|(_, e)| Error::Database(e))?;

        match &self.location {
            Some(location) => tracing::info!(location = %location.display(), "closed http cache"),
            None => tracing::info!("closed in-memory http cache"),
        }
        Ok(())
    }

    /// Lock the connection, recovering it if another thread panicked while
    /// holding it. SQLite rolls back any transaction left open by the panic.
    pub(crate) fn connection(&self, op: &'static str) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(
                    op,
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned cache connection"
                );
                poisoned.into_inner()
            }
        }
    }
}
