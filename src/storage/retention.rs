//! Background retention loop.
//!
//! Applies the configured eviction policies (age, row count, byte size)
//! against the store at a fixed cadence. The loop is cancellable at its
//! warm-up delay and at each inter-tick wait, never dies from a failed
//! pass, and reports failures through the error callback.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::constants::{
    RETENTION_WARMUP_DELAY, SIZE_POLICY_TARGET_RATIO, VACUUM_THRESHOLD_ROWS,
};
use crate::config::SinkOptions;
use crate::error_handling::{ErrorCallback, StoreError};

use super::schema::SchemaManager;
use super::values::render_timestamp;

/// Applies retention policies against the store, on a schedule and on
/// demand.
pub struct RetentionEngine {
    schema: Arc<SchemaManager>,
    max_age: Option<Duration>,
    max_rows: Option<u64>,
    max_bytes: Option<u64>,
    use_utc: bool,
    callback: Option<ErrorCallback>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RetentionEngine {
    /// Builds the engine and, when at least one policy is configured,
    /// spawns the scheduled loop. With no policy the engine stays idle
    /// forever and manual passes are no-ops.
    pub fn start(schema: Arc<SchemaManager>, options: &SinkOptions) -> Arc<Self> {
        let engine = Arc::new(RetentionEngine {
            schema,
            max_age: options.max_age,
            max_rows: options.max_rows,
            max_bytes: options.max_bytes,
            use_utc: options.use_utc_timestamps,
            callback: options.error_callback.clone(),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        if engine.is_configured() {
            let loop_engine = Arc::clone(&engine);
            let period = options.cleanup_interval;
            let handle = tokio::spawn(async move { loop_engine.run_loop(period).await });
            *engine.task.lock().expect("retention task lock") = Some(handle);
        }

        engine
    }

    fn is_configured(&self) -> bool {
        self.max_age.is_some() || self.max_rows.is_some() || self.max_bytes.is_some()
    }

    async fn run_loop(self: Arc<Self>, period: Duration) {
        // Insulate application startup from cleanup I/O
        tokio::select! {
            _ = tokio::time::sleep(RETENTION_WARMUP_DELAY) => {}
            _ = self.cancel.cancelled() => return,
        }

        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Retention pass failed: {e}");
                        self.report(&e);
                    }
                }
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    /// Runs exactly one cleanup pass: age, then count, then size. The
    /// first failing policy aborts the rest of the pass; whatever ran
    /// before it has already taken effect. Returns the total number of
    /// rows deleted.
    pub async fn run_once(&self) -> Result<u64, StoreError> {
        if !self.is_configured() {
            return Ok(0);
        }

        self.schema.ensure_schema().await?;

        let mut deleted = 0u64;

        if let Some(max_age) = self.max_age {
            let age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
            let cutoff_time = Utc::now()
                .checked_sub_signed(age)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let cutoff = render_timestamp(cutoff_time, self.use_utc);
            deleted += self.schema.delete_before(&cutoff).await?;
        }

        if let Some(max_rows) = self.max_rows {
            let count = self.schema.row_count().await?;
            if count > max_rows {
                deleted += self.schema.delete_oldest(count - max_rows).await?;
            }
        }

        if let Some(max_bytes) = self.max_bytes {
            deleted += self.apply_size_policy(max_bytes).await?;
        }

        if deleted > 0 {
            info!(
                "Retention removed {} rows from \"{}\"",
                deleted,
                self.schema.table()
            );
        }
        Ok(deleted)
    }

    /// Estimates average bytes per row and deletes the oldest rows down to
    /// 80% of the configured maximum. The estimate assumes roughly uniform
    /// row sizes and can over- or under-delete for highly skewed data.
    async fn apply_size_policy(&self, max_bytes: u64) -> Result<u64, StoreError> {
        let size = self.schema.store_size_bytes().await?;
        if size <= max_bytes {
            return Ok(0);
        }
        let count = self.schema.row_count().await?;
        if count == 0 {
            return Ok(0);
        }

        let avg_row_bytes = (size / count).max(1);
        let target_rows =
            ((max_bytes as f64 * SIZE_POLICY_TARGET_RATIO) / avg_row_bytes as f64) as u64;
        if count <= target_rows {
            return Ok(0);
        }

        let removed = self.schema.delete_oldest(count - target_rows).await?;
        if removed > VACUUM_THRESHOLD_ROWS {
            // Best-effort: reclamation failure must not fail the pass
            if let Err(e) = self.schema.compact().await {
                warn!("Compaction after size-based cleanup failed: {e}");
                self.report(&e);
            }
        }
        Ok(removed)
    }

    fn report(&self, err: &StoreError) {
        if let Some(callback) = &self.callback {
            callback.call(err);
        }
    }

    /// Cancels the scheduled loop and waits for it to exit. Repeated calls
    /// are no-ops.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().expect("retention task lock").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
