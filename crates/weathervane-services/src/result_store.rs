//! Result store: task results keyed by task id.
//!
//! `SqliteResultStore` is the durable implementation used by the service;
//! `MemoryResultStore` backs tests and embedded use. Writes are upserts, so
//! storing the same task twice leaves one row with the latest result.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use weathervane_core::{AppError, DatabaseError, RusqliteErrorExt};

use crate::task::{TaskId, TaskResult};

/// Errors raised by the result store and the region archive.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into_database_error())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Io(e) => AppError::Io(e),
            StoreError::Serialization(e) => AppError::Service(e.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value sink for task results.
pub trait ResultStore: Send + Sync {
    /// Verify the store is reachable.
    fn ping(&self) -> StoreResult<()>;

    /// Store the result of a task, replacing any earlier write for the same id.
    fn put(&self, task_id: &TaskId, result: &TaskResult) -> StoreResult<()>;

    /// Get the result of a task.
    ///
    /// Returns `None` if nothing was stored for this id.
    fn get(&self, task_id: &TaskId) -> StoreResult<Option<TaskResult>>;
}

/// SQLite-backed result store.
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS task_results (
                task_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                city_count INTEGER NOT NULL,
                stored_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Number of stored task results.
    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM task_results", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ResultStore for SqliteResultStore {
    fn ping(&self) -> StoreResult<()> {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
        Ok(())
    }

    fn put(&self, task_id: &TaskId, result: &TaskResult) -> StoreResult<()> {
        let payload = serde_json::to_string(result)?;
        self.conn.lock().execute(
            r#"
            INSERT INTO task_results (task_id, payload, city_count, stored_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(task_id) DO UPDATE SET
                payload = excluded.payload,
                city_count = excluded.city_count,
                stored_at = excluded.stored_at
            "#,
            params![
                task_id.as_str(),
                payload,
                result.len() as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        tracing::debug!("Stored result for task {} ({} cities)", task_id, result.len());
        Ok(())
    }

    fn get(&self, task_id: &TaskId) -> StoreResult<Option<TaskResult>> {
        let payload: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT payload FROM task_results WHERE task_id = ?1",
                params![task_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(StoreError::from)
    }
}

/// In-memory result store.
#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<HashMap<TaskId, TaskResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

impl ResultStore for MemoryResultStore {
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn put(&self, task_id: &TaskId, result: &TaskResult) -> StoreResult<()> {
        self.results.write().insert(task_id.clone(), result.clone());
        Ok(())
    }

    fn get(&self, task_id: &TaskId) -> StoreResult<Option<TaskResult>> {
        Ok(self.results.read().get(task_id).cloned())
    }
}
