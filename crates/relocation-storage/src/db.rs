//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex and configures WAL mode on
//! open. Migrations run before the handle is returned.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use relocation_core::error::RelocationError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, RelocationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| RelocationError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| RelocationError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::migrated(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, RelocationError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            RelocationError::Storage(format!("Failed to open in-memory db: {}", e))
        })?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, RelocationError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with the underlying connection. The mutex is held
    /// for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RelocationError>
    where
        F: FnOnce(&Connection) -> Result<T, RelocationError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelocationError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
