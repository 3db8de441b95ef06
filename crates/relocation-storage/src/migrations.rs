//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use relocation_core::error::RelocationError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), RelocationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| RelocationError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version = current_version(conn)?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: kv_entries");
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64, RelocationError> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| RelocationError::Storage(format!("Failed to query migration version: {}", e)))
}

/// Version 1: one row per persisted entity, value stored as JSON text.
fn apply_v1(conn: &Connection) -> Result<(), RelocationError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_entries (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'kv_entries');
        ",
    )
    .map_err(|e| RelocationError::Storage(format!("Migration v1 failed: {}", e)))
}
