//! Relocation Storage crate - durable key-value persistence for plan state.
//!
//! Provides a WAL-mode SQLite database with migrations, a `KeyValueStore`
//! abstraction with SQLite and in-memory implementations, and typed JSON
//! helpers that never propagate failures to the caller.

pub mod db;
pub mod kv;
pub mod migrations;

pub use db::Database;
pub use kv::{load_json, persist_json, KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
