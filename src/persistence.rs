//! Durable backing for committed snapshots

use crate::error::AppError;
use crate::store::{CommitInfo, MemKv};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// Abstraction for persistence backends. `save_commit` must be atomic: after
/// it returns `Ok`, `load_latest` yields exactly the saved snapshot.
pub trait StatePersistence: Send + Sync {
    fn save_commit(&self, info: &CommitInfo, state: &MemKv) -> Result<(), AppError>;
    fn load_latest(&self) -> Result<Option<(CommitInfo, MemKv)>, AppError>;
}

pub struct SqliteStateDb {
    conn: Mutex<Connection>,
}

impl SqliteStateDb {
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| AppError::DatabaseError(format!("Failed to create state table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS commits (
                height INTEGER PRIMARY KEY,
                app_hash BLOB NOT NULL,
                committed_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| AppError::DatabaseError(format!("Failed to create commits table: {}", e)))?;

        Ok(SqliteStateDb {
            conn: Mutex::new(conn),
        })
    }

    /// Number of commits recorded so far.
    pub fn commit_count(&self) -> Result<u64, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::DatabaseError("Mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl StatePersistence for SqliteStateDb {
    fn save_commit(&self, info: &CommitInfo, state: &MemKv) -> Result<(), AppError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| AppError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            AppError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute("DELETE FROM state", [])
            .map_err(|e| AppError::DatabaseError(format!("Failed to clear state: {}", e)))?;

        for (key, value) in state.iter() {
            tx.execute(
                "INSERT INTO state (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| AppError::DatabaseError(format!("Failed to save entry: {}", e)))?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO commits (height, app_hash, committed_at) VALUES (?1, ?2, ?3)",
            params![
                info.height as i64,
                info.app_hash.to_vec(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::DatabaseError(format!("Failed to record commit: {}", e)))?;

        // Commit all changes atomically
        tx.commit().map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    fn load_latest(&self) -> Result<Option<(CommitInfo, MemKv)>, AppError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| AppError::DatabaseError("Mutex poisoned".to_string()))?;

        let latest = conn_guard
            .query_row(
                "SELECT height, app_hash FROM commits ORDER BY height DESC LIMIT 1",
                [],
                |row| {
                    let height: i64 = row.get(0)?;
                    let hash: Vec<u8> = row.get(1)?;
                    Ok((height, hash))
                },
            )
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to query commits: {}", e)))?;

        let Some((height, hash_bytes)) = latest else {
            return Ok(None);
        };

        let app_hash: [u8; 32] = hash_bytes.as_slice().try_into().map_err(|_| {
            AppError::DatabaseError(format!(
                "Stored app hash has {} bytes, expected 32",
                hash_bytes.len()
            ))
        })?;

        let mut stmt = conn_guard
            .prepare("SELECT key, value FROM state")
            .map_err(|e| AppError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                let key: Vec<u8> = row.get(0)?;
                let value: Vec<u8> = row.get(1)?;
                Ok((key, value))
            })
            .map_err(|e| AppError::DatabaseError(format!("Failed to query state: {}", e)))?;

        let mut entries = Vec::new();
        for row_result in rows {
            entries.push(
                row_result
                    .map_err(|e| AppError::DatabaseError(format!("Failed to read row: {}", e)))?,
            );
        }

        let info = CommitInfo {
            height: height as u64,
            app_hash,
        };
        Ok(Some((info, entries.into_iter().collect())))
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    latest: Arc<Mutex<Option<(CommitInfo, MemKv)>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatePersistence for InMemoryPersistence {
    fn save_commit(&self, info: &CommitInfo, state: &MemKv) -> Result<(), AppError> {
        let mut latest = self
            .latest
            .lock()
            .map_err(|_| AppError::DatabaseError("Mutex poisoned".to_string()))?;
        *latest = Some((info.clone(), state.clone()));
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<(CommitInfo, MemKv)>, AppError> {
        let latest = self
            .latest
            .lock()
            .map_err(|_| AppError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(latest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{root_hash, KvStore};

    fn sample_state() -> MemKv {
        let mut state = MemKv::new();
        state.set(b"base/chain_id".to_vec(), b"test-chain".to_vec());
        state.set(b"kv/a".to_vec(), b"1".to_vec());
        state
    }

    #[test]
    fn test_database_open() {
        let db = SqliteStateDb::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
        assert!(db.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_sqlite_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.db");
        let path = path.to_str().unwrap();
        let state = sample_state();
        let info = CommitInfo {
            height: 7,
            app_hash: root_hash(&state),
        };

        {
            let db = SqliteStateDb::open(path).unwrap();
            db.save_commit(&info, &state).unwrap();
            assert_eq!(db.commit_count().unwrap(), 1);
        }

        let reopened = SqliteStateDb::open(path).unwrap();
        let (loaded_info, loaded_state) = reopened.load_latest().unwrap().unwrap();
        assert_eq!(loaded_info, info);
        assert_eq!(loaded_state, state);
    }

    #[test]
    fn test_sqlite_overwrites_removed_keys() {
        let db = SqliteStateDb::open(":memory:").unwrap();
        let mut state = sample_state();
        db.save_commit(&CommitInfo { height: 1, app_hash: root_hash(&state) }, &state)
            .unwrap();
        state.remove(b"kv/a");
        db.save_commit(&CommitInfo { height: 2, app_hash: root_hash(&state) }, &state)
            .unwrap();

        let (info, loaded) = db.load_latest().unwrap().unwrap();
        assert_eq!(info.height, 2);
        assert!(!loaded.has(b"kv/a"));
    }

    #[test]
    fn test_in_memory_roundtrip() {
        let persistence = InMemoryPersistence::new();
        assert!(persistence.load_latest().unwrap().is_none());
        let state = sample_state();
        let info = CommitInfo { height: 3, app_hash: root_hash(&state) };
        persistence.save_commit(&info, &state).unwrap();
        assert_eq!(persistence.load_latest().unwrap(), Some((info, state)));
    }
}
