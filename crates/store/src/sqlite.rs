//! SQLite to-do item store.
//!
//! One table, `todos (id INTEGER PRIMARY KEY AUTOINCREMENT, item TEXT NOT NULL)`.
//! AUTOINCREMENT keeps ids monotonic across deletes; `clear_all` leaves
//! `sqlite_sequence` alone so an id is never handed out twice.

use async_trait::async_trait;
use snello_core::error::StoreError;
use snello_core::store::{ItemStore, ToDoItem};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const IN_MEMORY: &str = ":memory:";

/// A SQLite-backed item store.
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let in_memory = path.as_os_str() == IN_MEMORY;

        let base = if in_memory {
            SqliteConnectOptions::from_str(IN_MEMORY)
                .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("Failed to create database directory: {e}"))
                })?;
            }
            SqliteConnectOptions::new().filename(path)
        };
        let options = base
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" is a separate database, so the pool
        // must hold exactly one connection and never recycle it.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite item store initialized at {}", path.display());
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                item TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("todos table: {e}")))?;

        Ok(())
    }
}

/// Connection-level failures make the store unavailable; anything else is a
/// failed statement.
fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => StoreError::Unavailable(e.to_string()),
        other => StoreError::QueryFailed(other.to_string()),
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add_item(&self, text: &str) -> Result<ToDoItem, StoreError> {
        let result = sqlx::query("INSERT INTO todos (item) VALUES (?)")
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let id = result.last_insert_rowid();
        debug!(id, "Added to-do item");
        Ok(ToDoItem {
            id,
            text: text.to_string(),
        })
    }

    async fn remove_item(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let removed = result.rows_affected() > 0;
        debug!(id, removed, "Remove to-do item");
        Ok(removed)
    }

    async fn list_items(&self) -> Result<Vec<ToDoItem>, StoreError> {
        let rows = sqlx::query("SELECT id, item FROM todos ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ToDoItem {
                    id: row.try_get("id").map_err(map_sqlx)?,
                    text: row.try_get("item").map_err(map_sqlx)?,
                })
            })
            .collect()
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM todos")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        info!(removed = result.rows_affected(), "Cleared to-do list");
        Ok(())
    }
}
