//! SQLite backing store.
//!
//! One connection, one statement cache, one schema. The store is strictly
//! single-threaded; `fuser` delivers upcalls serially and every caller goes
//! through `&mut Store`, so no statement or blob handle is ever shared
//! between in-flight operations.

pub mod files;
pub mod paths;
pub mod sql;

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use super::error::FsResult;

/// Owns the database connection for one mounted filesystem.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the database file and bootstrap the schema.
    pub fn open(db_path: &Path) -> FsResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self::bootstrap(conn)?;
        info!("opened store at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store, used by the test suite.
    pub fn open_in_memory() -> FsResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> FsResult<Self> {
        // WAL improves write throughput and gives crash recovery. The pragma
        // returns the resulting mode as a row, so it runs as a query.
        let mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("journal mode: {mode}");

        conn.execute_batch(sql::SCHEMA)?;
        conn.set_prepared_statement_cache_capacity(sql::STATEMENT_COUNT);
        Ok(Self { conn })
    }

    /// Unmount-time cleanup: drop cached statements and fold the WAL back
    /// into the main database file.
    pub fn shutdown(&mut self) {
        self.conn.flush_prepared_statement_cache();
        if let Err(err) = self
            .conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        {
            tracing::warn!("wal checkpoint failed: {err}");
        }
    }
}
