//! Configuration constants.
//!
//! This module defines the constants used as option defaults and as fixed
//! operational parameters of the write and retention paths.

use std::time::Duration;

// constants (used as defaults)
/// Default table name for persisted events
pub const DEFAULT_TABLE_NAME: &str = "Logs";
/// Number of buffered events that triggers a flush
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Interval between time-based flushes
pub const DEFAULT_BATCH_PERIOD: Duration = Duration::from_secs(5);
/// Bound on the in-memory queue; events arriving beyond it are dropped
pub const DEFAULT_QUEUE_LIMIT: usize = 100_000;
/// Interval between retention passes
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

// Retention engine parameters
/// Delay before the first retention pass, so cleanup I/O does not compete
/// with application startup
pub const RETENTION_WARMUP_DELAY: Duration = Duration::from_secs(30);
/// The size policy deletes down to this fraction of the configured maximum
pub const SIZE_POLICY_TARGET_RATIO: f64 = 0.8;
/// A single pass deleting more rows than this triggers a VACUUM
pub const VACUUM_THRESHOLD_ROWS: u64 = 1000;

// SQLite tuning applied to every connection
/// Memory-map size in bytes (128MB)
pub const MMAP_SIZE: i64 = 128 * 1024 * 1024;
/// Page cache size; negative means KiB per SQLite convention (10MB)
pub const PAGE_CACHE_SIZE: i64 = -10_240;
