//! Durable key-value persistence.
//!
//! Each plan entity (selected services, tasks, relocation profile) is stored
//! as a JSON document under its own key.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use relocation_core::error::{RelocationError, Result};

use crate::db::Database;

/// Persist/load by key.
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when no value is stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;

    fn persist(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

// =============================================================================
// SQLite
// =============================================================================

/// `KeyValueStore` backed by the `kv_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db: Arc<Database>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::new(path)?)))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RelocationError::Storage(format!("Failed to load {}: {}", key, e)))
        })
    }

    fn persist(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(|e| RelocationError::Storage(format!("Failed to persist {}: {}", key, e)))?;
            debug!(key, bytes = value.len(), "Persisted entry");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                .map_err(|e| {
                    RelocationError::Storage(format!("Failed to remove {}: {}", key, e))
                })?;
            Ok(())
        })
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local `KeyValueStore`, used in tests and when no data dir is set.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| RelocationError::Storage(format!("Lock poisoned: {}", e)))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Load and decode a JSON value. Missing keys, read failures, and malformed
/// documents all yield `None`; failures are logged.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted entry");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding malformed persisted entry");
            None
        }
    }
}

/// Encode and persist a value. Failures are logged and swallowed.
pub fn persist_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(key, error = %e, "Failed to encode entry for persistence");
            return;
        }
    };
    if let Err(e) = store.persist(key, &encoded) {
        warn!(key, error = %e, "Failed to persist entry");
    }
}
