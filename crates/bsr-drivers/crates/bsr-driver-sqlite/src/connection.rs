//! SQLite connection implementation

use async_trait::async_trait;
use bsr_core::{BsrError, Connection, Result, StatementResult};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Busy timeout used when the target does not set `busy_timeout_ms`
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a `sqlite:` target points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    /// `file:` URI, passed through to SQLite untouched
    Uri(String),
    File(PathBuf),
}

impl SqliteTarget {
    /// Resolve `~/` against the home directory and relative paths against the
    /// working directory.
    pub fn resolve(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Ok(Self::Memory);
        }
        if path.starts_with("file:") {
            return Ok(Self::Uri(path.to_string()));
        }

        let path = match path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .ok_or_else(|| BsrError::Configuration("Unable to determine home directory".into()))?
                .join(rest),
            None if path.starts_with('~') => {
                return Err(BsrError::Configuration(format!(
                    "'{}': only ~/ is expanded, not ~user/",
                    path
                )));
            }
            None => PathBuf::from(path),
        };

        if path.is_relative() {
            Ok(Self::File(std::env::current_dir()?.join(path)))
        } else {
            Ok(Self::File(path))
        }
    }
}

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a database with the default busy timeout
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_timeout(&SqliteTarget::resolve(path)?, DEFAULT_BUSY_TIMEOUT)
    }

    #[tracing::instrument(skip_all, fields(db = ?target))]
    pub fn open_with_timeout(target: &SqliteTarget, busy_timeout: Duration) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = match target {
            SqliteTarget::Memory => RusqliteConnection::open_in_memory(),
            SqliteTarget::Uri(uri) => RusqliteConnection::open_with_flags(uri, flags),
            SqliteTarget::File(path) => {
                // SQLite would create the file but not its directory
                if let Some(parent) = path.parent()
                    && !parent.is_dir()
                {
                    return Err(BsrError::Connection(format!(
                        "Directory for database does not exist: {}",
                        parent.display()
                    )));
                }
                RusqliteConnection::open_with_flags(path, flags)
            }
        }
        .map_err(|e| BsrError::Connection(format!("Cannot open {:?}: {}", target, e)))?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .and_then(|_| conn.busy_timeout(busy_timeout))
            .map_err(|e| BsrError::Connection(format!("Cannot configure connection: {}", e)))?;

        tracing::debug!("SQLite database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BsrError::Connection("Connection is closed".into()));
        }
        Ok(())
    }
}

/// `total_changes()` counts every row touched by INSERT/UPDATE/DELETE on
/// this connection, so the delta across a blob is its affected row count.
fn total_changes(conn: &RusqliteConnection) -> Result<u64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(|e| BsrError::Query(format!("Failed to read change counter: {}", e)))
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        self.ensure_open()?;
        let conn = self.conn.lock();

        let rows_affected = conn
            .execute(sql, [])
            .map_err(|e| BsrError::Query(format!("Failed to execute statement: {}", e)))?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(StatementResult::with_affected_rows(rows_affected as u64))
    }

    #[tracing::instrument(skip(self, sql), fields(sql_len = sql.len()))]
    async fn execute_batch(&self, sql: &str) -> Result<StatementResult> {
        self.ensure_open()?;
        let conn = self.conn.lock();

        let before = total_changes(&conn)?;
        conn.execute_batch(sql)
            .map_err(|e| BsrError::Query(format!("Failed to execute batch: {}", e)))?;
        let after = total_changes(&conn)?;

        let affected_rows = after.saturating_sub(before);
        tracing::debug!(affected_rows, "SQL batch executed");
        Ok(StatementResult::with_affected_rows(affected_rows))
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("closing SQLite connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
