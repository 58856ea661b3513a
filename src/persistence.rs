//! Database persistence layer for utxochain
//!
//! The ledger only needs a byte-oriented key/value store: point reads, and atomic writes of
//! several keys at once so a block and the chain-head pointer always land together.

use crate::error::ChainError;
use parking_lot::Mutex as FastMutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Abstraction for persistence backends.
pub trait Persistence: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;

    /// Applies every entry of `batch` or none of them.
    fn write_batch(&self, batch: &WriteBatch) -> Result<(), ChainError>;

    fn contains(&self, key: &[u8]) -> Result<bool, ChainError> {
        Ok(self.get(key)?.is_some())
    }
}

/// An ordered set of puts committed as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create kv table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}

impl Persistence for Database {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;

        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|e| ChainError::DatabaseError(format!("Failed to read key: {}", e)))
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), ChainError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        for (key, value) in batch.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to write key: {}", e)))?;
        }

        // Dropping `tx` without commit rolls every put back.
        tx.commit().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    entries: Arc<FastMutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Overwrites a single key outside of any batch. Intended for fault-injection in tests.
    pub fn put_raw(&self, key: &[u8], value: &[u8]) {
        self.entries.lock().insert(key.to_vec(), value.to_vec());
    }
}

impl Persistence for InMemoryPersistence {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), ChainError> {
        let mut entries = self.entries.lock();
        for (key, value) in batch.iter() {
            entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_open() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
        assert_eq!(db.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_database_batch_roundtrip() {
        let db = Database::open(":memory:").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"block".to_vec(), b"payload".to_vec());
        batch.put(b"lh".to_vec(), b"block".to_vec());
        db.write_batch(&batch).unwrap();

        assert_eq!(db.get(b"block").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(db.get(b"lh").unwrap(), Some(b"block".to_vec()));
        assert!(db.contains(b"lh").unwrap());
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_database_overwrite() {
        let db = Database::open(":memory:").unwrap();
        let mut first = WriteBatch::new();
        first.put(b"lh".to_vec(), b"one".to_vec());
        db.write_batch(&first).unwrap();

        let mut second = WriteBatch::new();
        second.put(b"lh".to_vec(), b"two".to_vec());
        db.write_batch(&second).unwrap();

        assert_eq!(db.get(b"lh").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::open(path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"lh".to_vec(), vec![1, 2, 3]);
            db.write_batch(&batch).unwrap();
        }

        let reopened = Database::open(path).unwrap();
        assert_eq!(reopened.get(b"lh").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_in_memory_shares_state_between_clones() {
        let store = InMemoryPersistence::new();
        let handle = store.clone();
        assert!(store.is_empty());

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec()).put(b"b".to_vec(), b"2".to_vec());
        assert_eq!(batch.len(), 2);
        handle.write_batch(&batch).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }
}
