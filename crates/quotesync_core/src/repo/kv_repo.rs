//! Key-value repository contracts and implementations.
//!
//! # Responsibility
//! - Provide the durable key-value capability (SQLite `kv_entries`).
//! - Provide the ephemeral key-value capability (process memory).
//!
//! # Invariants
//! - `put` is a whole-value overwrite; there are no partial updates.
//! - `remove` of a missing key is not an error.

use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of durable or ephemeral storage.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Value could not be encoded for storage.
    Encode(serde_json::Error),
    /// Persisted value exists but cannot be decoded.
    InvalidData { key: String, message: String },
    /// Backend is unusable (poisoned lock, closed handle).
    Unavailable(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode value: {err}"),
            Self::InvalidData { key, message } => {
                write!(f, "invalid persisted data under `{key}`: {message}")
            }
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidData { .. } | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Unavailable("lock poisoned".to_string())
    }
}

/// String key-value storage used by the quote store.
pub trait KeyValueRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Durable key-value repository over the `kv_entries` table.
///
/// Owns its connection so the store can move across threads with it.
pub struct SqliteKeyValueRepository {
    conn: Connection,
}

impl SqliteKeyValueRepository {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl KeyValueRepository for SqliteKeyValueRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }
}

/// Process-lifetime key-value repository. Backs session storage.
#[derive(Debug, Default)]
pub struct MemoryKeyValueRepository {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueRepository for MemoryKeyValueRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .lock()?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock()?.remove(key);
        Ok(())
    }
}
