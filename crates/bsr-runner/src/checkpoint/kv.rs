//! Key-value backends for checkpoint markers

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::{RunnerError, RunnerResult};

/// File name of the checkpoint database inside a job directory
pub const CHECKPOINT_DB_FILE: &str = "checkpoints.db";

/// Minimal string key-value store backing a [`CheckpointStore`](super::CheckpointStore)
pub trait KvStore: Send {
    fn get(&self, key: &str) -> RunnerResult<Option<String>>;

    fn put(&mut self, key: &str, value: &str) -> RunnerResult<()>;

    /// Write several entries; implementations should make this atomic.
    fn put_many(&mut self, entries: &[(String, String)]) -> RunnerResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> RunnerResult<()>;

    /// All entries ordered by key
    fn entries(&self) -> RunnerResult<Vec<(String, String)>>;

    /// Force buffered writes to durable storage
    fn flush(&mut self) -> RunnerResult<()> {
        Ok(())
    }
}

/// SQLite-backed store; every write is durable before it returns
pub struct SqliteKvStore {
    conn: Connection,
    db_path: PathBuf,
}

impl SqliteKvStore {
    /// Open (creating if needed) the checkpoint database in `dir`
    pub fn open(dir: &Path) -> RunnerResult<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(CHECKPOINT_DB_FILE);

        let conn = Connection::open(&db_path).map_err(|e| {
            RunnerError::Storage(format!("failed to open checkpoint database {}: {}", db_path.display(), e))
        })?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        tracing::debug!(path = %db_path.display(), "opened checkpoint database");
        Ok(Self { conn, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> RunnerResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM checkpoints WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, key: &str, value: &str) -> RunnerResult<()> {
        self.conn.execute(
            "INSERT INTO checkpoints (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn put_many(&mut self, entries: &[(String, String)]) -> RunnerResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO checkpoints (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> RunnerResult<()> {
        self.conn.execute("DELETE FROM checkpoints WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn entries(&self) -> RunnerResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM checkpoints ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn flush(&mut self) -> RunnerResult<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> RunnerResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> RunnerResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> RunnerResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn entries(&self) -> RunnerResult<Vec<(String, String)>> {
        Ok(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
