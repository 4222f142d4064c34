//! Configuration types.
//!
//! This module defines the option structs and enums used to construct a
//! sink. Options are plain values; the sink takes ownership of them at
//! construction, so later caller-side changes cannot affect a running sink.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::constants::{
    DEFAULT_BATCH_PERIOD, DEFAULT_BATCH_SIZE, DEFAULT_CLEANUP_INTERVAL, DEFAULT_QUEUE_LIMIT,
    DEFAULT_TABLE_NAME,
};
use crate::error_handling::{ConfigError, ErrorCallback};
use crate::event::Level;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file at the given path. Parent directories are created on
    /// first schema use.
    File(PathBuf),
    /// A private in-memory database with no on-disk footprint.
    Memory,
}

impl StoreLocation {
    /// Whether this is the in-memory location.
    pub fn is_memory(&self) -> bool {
        matches!(self, StoreLocation::Memory)
    }
}

/// SQLite journal mode applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the rollback journal after each transaction.
    Delete,
    /// Truncate the rollback journal instead of deleting it.
    Truncate,
    /// Keep the rollback journal file, zeroing its header.
    Persist,
    /// Keep the rollback journal in memory.
    Memory,
    /// Write-ahead logging; readers and writers do not block each other.
    Wal,
}

/// SQLite synchronous mode applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// No sync calls; fastest, unsafe on power loss.
    Off,
    /// Sync at critical moments.
    Normal,
    /// Sync after every write.
    Full,
    /// Like Full, plus syncing the containing directory.
    Extra,
}

/// A deployment-specific table column populated from a named event property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionColumn {
    /// Column name in the table.
    pub name: String,
    /// Declared SQLite type, e.g. `TEXT`, `INTEGER`, `REAL`.
    pub sql_type: String,
    /// Name of the event property the column is populated from.
    pub source_property: String,
    /// Whether the column accepts NULL. A missing property always binds
    /// NULL; with `allow_null` false the store's own constraint rejects it
    /// at write time.
    pub allow_null: bool,
    /// Whether to build a lookup index on the column.
    pub indexed: bool,
}

impl ExtensionColumn {
    /// Creates a nullable, unindexed column reading from `source_property`.
    pub fn new(
        name: impl Into<String>,
        sql_type: impl Into<String>,
        source_property: impl Into<String>,
    ) -> Self {
        ExtensionColumn {
            name: name.into(),
            sql_type: sql_type.into(),
            source_property: source_property.into(),
            allow_null: true,
            indexed: false,
        }
    }

    /// Sets the nullability flag.
    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    /// Requests a lookup index on the column.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Sink configuration.
///
/// Construct with struct-update syntax over [`Default::default`]. Every
/// numeric and duration field is validated when the sink is opened;
/// validation failures name the offending field.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Database location.
    pub location: StoreLocation,
    /// Target table name.
    pub table_name: String,
    /// Minimum level accepted by the sink; lower levels are discarded.
    pub minimum_level: Level,
    /// Store timestamps in UTC (true) or local time (false).
    pub use_utc_timestamps: bool,
    /// Number of buffered events that triggers a flush.
    pub batch_size: usize,
    /// Interval between time-based flushes.
    pub batch_period: Duration,
    /// Queue capacity bound; `None` means unbounded. When the bound is
    /// reached, newly arriving events are dropped.
    pub queue_limit: Option<usize>,
    /// Delete rows older than this age. `None` disables the age policy.
    pub max_age: Option<Duration>,
    /// Keep at most this many rows. `None` disables the count policy.
    pub max_rows: Option<u64>,
    /// Keep the database under this many bytes. `None` disables the size
    /// policy.
    pub max_bytes: Option<u64>,
    /// Interval between retention passes.
    pub cleanup_interval: Duration,
    /// Journal mode for every connection.
    pub journal_mode: JournalMode,
    /// Synchronous mode for every connection.
    pub sync_mode: SyncMode,
    /// Store event properties as a JSON blob.
    pub store_json_properties: bool,
    /// Store formatted error details.
    pub store_exceptions: bool,
    /// Truncate rendered messages to this many characters. `None` means
    /// unlimited.
    pub max_message_length: Option<usize>,
    /// Truncate formatted error text to this many characters.
    pub max_exception_length: Option<usize>,
    /// Truncate the JSON properties blob to this many characters. Truncation
    /// may leave invalid JSON in the column; this is an accepted tradeoff.
    pub max_properties_length: Option<usize>,
    /// Callback invoked on background write and retention failures.
    pub error_callback: Option<ErrorCallback>,
    /// Surface write errors out of the sink instead of swallowing them
    /// after the callback.
    pub propagate_errors: bool,
    /// Create the table and indices on first use.
    pub auto_create_schema: bool,
    /// Extension column definitions, in table order.
    pub columns: Vec<ExtensionColumn>,
    /// Extra PRAGMA key-value pairs applied to every connection.
    pub pragmas: BTreeMap<String, String>,
}

impl Default for SinkOptions {
    fn default() -> Self {
        SinkOptions {
            location: StoreLocation::File(PathBuf::from("./logs.db")),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            minimum_level: Level::Verbose,
            use_utc_timestamps: true,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_period: DEFAULT_BATCH_PERIOD,
            queue_limit: Some(DEFAULT_QUEUE_LIMIT),
            max_age: None,
            max_rows: None,
            max_bytes: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Normal,
            store_json_properties: true,
            store_exceptions: true,
            max_message_length: None,
            max_exception_length: None,
            max_properties_length: None,
            error_callback: None,
            propagate_errors: false,
            auto_create_schema: true,
            columns: Vec::new(),
            pragmas: BTreeMap::new(),
        }
    }
}

impl SinkOptions {
    /// Validates every setting, returning an error naming the first field
    /// that fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "table_name",
                reason: "must not be empty",
            });
        }
        if self.table_name.contains('"') {
            return Err(ConfigError::InvalidValue {
                field: "table_name",
                reason: "must not contain a double quote",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than zero",
            });
        }
        if self.batch_period.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "batch_period",
                reason: "must be a positive duration",
            });
        }
        if self.queue_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "queue_limit",
                reason: "must be greater than zero when set",
            });
        }
        if self.max_age.is_some_and(|age| age.is_zero()) {
            return Err(ConfigError::InvalidValue {
                field: "max_age",
                reason: "must be a positive duration when set",
            });
        }
        if self.max_rows == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_rows",
                reason: "must be greater than zero when set",
            });
        }
        if self.max_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_bytes",
                reason: "must be greater than zero when set",
            });
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cleanup_interval",
                reason: "must be a positive duration",
            });
        }
        if self.max_message_length == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_message_length",
                reason: "must be greater than zero when set",
            });
        }
        if self.max_exception_length == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_exception_length",
                reason: "must be greater than zero when set",
            });
        }
        if self.max_properties_length == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_properties_length",
                reason: "must be greater than zero when set",
            });
        }
        for (index, column) in self.columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(ConfigError::InvalidExtensionColumn {
                    index,
                    reason: "column name must not be empty",
                });
            }
            if column.name.contains('"') {
                return Err(ConfigError::InvalidExtensionColumn {
                    index,
                    reason: "column name must not contain a double quote",
                });
            }
            if column.source_property.is_empty() {
                return Err(ConfigError::InvalidExtensionColumn {
                    index,
                    reason: "source property name must not be empty",
                });
            }
            if column.sql_type.is_empty() {
                return Err(ConfigError::InvalidExtensionColumn {
                    index,
                    reason: "declared type must not be empty",
                });
            }
        }
        Ok(())
    }
}
