// Shared test helpers for sink construction and database inspection.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::Path;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;

use logsink::{Level, LogEvent, SinkOptions, StoreLocation};

/// Builds file-backed options with flushing under explicit test control:
/// the period is effectively infinite and the size threshold is high, so
/// rows only land when the test calls `flush()`.
#[allow(dead_code)] // Used by other test files
pub fn file_options(path: &Path) -> SinkOptions {
    let _ = env_logger::builder().is_test(true).try_init();
    SinkOptions {
        location: StoreLocation::File(path.to_path_buf()),
        batch_period: Duration::from_secs(3600),
        batch_size: 100_000,
        queue_limit: None,
        ..Default::default()
    }
}

/// Opens an independent pool on the sink's database file so tests can
/// inspect stored rows without going through the sink.
#[allow(dead_code)] // Used by other test files
pub async fn open_inspection_pool(path: &Path) -> SqlitePool {
    SqlitePool::connect(&format!("sqlite:{}", path.to_string_lossy()))
        .await
        .expect("Failed to open inspection pool")
}

/// Creates an event with a deterministic timestamp `index` seconds past a
/// fixed base, so timestamp ordering follows the index.
#[allow(dead_code)] // Used by other test files
pub fn event_at(index: i64, level: Level, message: impl Into<String>) -> LogEvent {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    LogEvent::new(level, message).with_timestamp(base + chrono::Duration::seconds(index))
}
