//! Connection and schema management.
//!
//! This module owns the single logical handle to the database:
//! - Connection options carrying the durability and performance pragmas
//! - Lazy, concurrency-safe creation of the table and its indices
//! - Count, size, deletion, and compaction primitives used by the writer
//!   and the retention engine

use std::time::Duration;

use log::{debug, info};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::config::constants::{MMAP_SIZE, PAGE_CACHE_SIZE};
use crate::config::{ExtensionColumn, JournalMode, SinkOptions, StoreLocation, SyncMode};
use crate::error_handling::StoreError;

/// Upper bound on pooled connections for file-backed stores.
const FILE_POOL_SIZE: u32 = 5;

/// Owns the connection pool and the table shape.
///
/// All reads and writes go through the pool built here, so journal mode,
/// synchronous mode, and the tuning pragmas are applied consistently. The
/// in-memory location pins the pool to one persistent connection, since
/// every separate in-memory connection would otherwise see its own empty
/// database.
pub struct SchemaManager {
    location: StoreLocation,
    table: String,
    columns: Vec<ExtensionColumn>,
    auto_create: bool,
    wal: bool,
    pool: SqlitePool,
    schema_init: OnceCell<()>,
}

impl SchemaManager {
    /// Builds the manager and its lazily-connecting pool.
    ///
    /// No I/O happens here; the first statement executed through the pool
    /// opens the actual connection.
    pub fn new(options: &SinkOptions) -> Self {
        let connect = build_connect_options(options);

        let pool = if options.location.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_lazy_with(connect)
        } else {
            SqlitePoolOptions::new()
                .max_connections(FILE_POOL_SIZE)
                .connect_lazy_with(connect)
        };

        SchemaManager {
            location: options.location.clone(),
            table: options.table_name.clone(),
            columns: options.columns.clone(),
            auto_create: options.auto_create_schema,
            wal: options.journal_mode == JournalMode::Wal,
            pool,
            schema_init: OnceCell::new(),
        }
    }

    /// The connection pool; every store operation goes through it.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The configured table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the table and indices on first call; later calls return
    /// immediately.
    ///
    /// Safe under concurrent invocation: exactly one caller performs the
    /// creation work while the rest wait on the cell, and a failed attempt
    /// leaves the cell unset so the next caller retries. A no-op forever
    /// when schema auto-creation is disabled.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        if !self.auto_create {
            return Ok(());
        }
        self.schema_init
            .get_or_try_init(|| self.create_schema())
            .await?;
        Ok(())
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        if let StoreLocation::File(path) = &self.location {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StoreError::FileCreation(e.to_string()))?;
                }
            }
        }

        let create_table = build_create_table(&self.table, &self.columns);
        sqlx::query(&create_table).execute(&self.pool).await?;

        for statement in build_index_statements(&self.table, &self.columns) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }

        debug!("Ensured table \"{}\" and its indices exist", self.table);
        Ok(())
    }

    /// Number of rows currently in the table.
    pub async fn row_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// On-disk size of the database in bytes, from page count and page
    /// size. The in-memory location has no footprint and reports zero.
    pub async fn store_size_bytes(&self) -> Result<u64, StoreError> {
        if self.location.is_memory() {
            return Ok(0);
        }
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        Ok((page_count as u64) * (page_size as u64))
    }

    /// Deletes every row with a timestamp strictly before `cutoff` (in the
    /// same rendered form the writer stores). Returns the number of rows
    /// removed.
    pub async fn delete_before(&self, cutoff: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM \"{}\" WHERE timestamp < ?",
            self.table
        ))
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Deletes the `count` oldest rows by timestamp order. Returns the
    /// number of rows removed.
    pub async fn delete_oldest(&self, count: u64) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM \"{table}\" WHERE id IN \
             (SELECT id FROM \"{table}\" ORDER BY timestamp ASC LIMIT ?)",
            table = self.table
        ))
        .bind(count as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Rebuilds the database file to reclaim free pages.
    ///
    /// Slow, and needs roughly the database's current size in free disk
    /// space while it runs; never call this on a hot path. A no-op for the
    /// in-memory location.
    pub async fn compact(&self) -> Result<(), StoreError> {
        if self.location.is_memory() {
            return Ok(());
        }
        info!("Compacting database (VACUUM) for table \"{}\"", self.table);
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Truncates the write-ahead log back into the main database file.
    /// Only meaningful for file-backed stores in WAL mode.
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        if self.location.is_memory() || !self.wal {
            return Ok(());
        }
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Closes the pool, waiting for in-flight statements to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn build_connect_options(options: &SinkOptions) -> SqliteConnectOptions {
    let mut connect = match &options.location {
        StoreLocation::File(path) => SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true),
        StoreLocation::Memory => SqliteConnectOptions::new().in_memory(true),
    };

    connect = connect
        .journal_mode(map_journal_mode(options.journal_mode))
        .synchronous(map_sync_mode(options.sync_mode))
        .pragma("temp_store", "MEMORY")
        .pragma("mmap_size", MMAP_SIZE.to_string())
        .pragma("cache_size", PAGE_CACHE_SIZE.to_string());

    for (key, value) in &options.pragmas {
        connect = connect.pragma(key.clone(), value.clone());
    }

    connect
}

fn map_journal_mode(mode: JournalMode) -> SqliteJournalMode {
    match mode {
        JournalMode::Delete => SqliteJournalMode::Delete,
        JournalMode::Truncate => SqliteJournalMode::Truncate,
        JournalMode::Persist => SqliteJournalMode::Persist,
        JournalMode::Memory => SqliteJournalMode::Memory,
        JournalMode::Wal => SqliteJournalMode::Wal,
    }
}

fn map_sync_mode(mode: SyncMode) -> SqliteSynchronous {
    match mode {
        SyncMode::Off => SqliteSynchronous::Off,
        SyncMode::Normal => SqliteSynchronous::Normal,
        SyncMode::Full => SqliteSynchronous::Full,
        SyncMode::Extra => SqliteSynchronous::Extra,
    }
}

/// Builds the CREATE TABLE statement for the standard columns plus every
/// configured extension column.
pub(crate) fn build_create_table(table: &str, columns: &[ExtensionColumn]) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    level INTEGER NOT NULL,
    level_name TEXT NOT NULL,
    message TEXT,
    message_template TEXT,
    exception TEXT,
    properties TEXT,
    source_context TEXT,
    machine_name TEXT,
    thread_id TEXT"
    );
    for column in columns {
        sql.push_str(&format!(
            ",\n    \"{}\" {}{}",
            column.name,
            column.sql_type,
            if column.allow_null { "" } else { " NOT NULL" }
        ));
    }
    sql.push_str("\n)");
    sql
}

/// Builds the CREATE INDEX statements: timestamp, level, the composite
/// timestamp+level, and one per extension column flagged for indexing.
pub(crate) fn build_index_statements(table: &str, columns: &[ExtensionColumn]) -> Vec<String> {
    let mut statements = vec![
        format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_timestamp\" ON \"{table}\" (timestamp)"
        ),
        format!("CREATE INDEX IF NOT EXISTS \"idx_{table}_level\" ON \"{table}\" (level)"),
        format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_timestamp_level\" \
             ON \"{table}\" (timestamp, level)"
        ),
    ];
    for column in columns.iter().filter(|c| c.indexed) {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_{name}\" ON \"{table}\" (\"{name}\")",
            table = table,
            name = column.name
        ));
    }
    statements
}
