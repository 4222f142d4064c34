//! The sink: accepts events, batches them, and drives the writer.
//!
//! Producers call [`SqliteSink::emit`] from any thread; events are queued
//! and flushed to the batch writer when either the batch size threshold is
//! reached or the batch period elapses. The queue is bounded (when
//! configured) and sheds load by dropping new events rather than blocking
//! producers. The sink owns the writer, schema manager, and retention
//! engine, and tears them down in [`SqliteSink::close`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::SinkOptions;
use crate::error_handling::{ConfigError, ErrorCallback, StoreError};
use crate::event::{Level, LogEvent};
use crate::storage::{BatchWriter, RetentionEngine, SchemaManager};

enum SinkMessage {
    Event(LogEvent),
    Flush(oneshot::Sender<Result<(), StoreError>>),
    Shutdown,
}

enum QueueSender {
    Bounded(mpsc::Sender<SinkMessage>),
    Unbounded(mpsc::UnboundedSender<SinkMessage>),
}

impl QueueSender {
    /// Non-blocking enqueue; returns false when the queue is full or the
    /// worker is gone.
    fn try_send(&self, message: SinkMessage) -> bool {
        match self {
            QueueSender::Bounded(tx) => tx.try_send(message).is_ok(),
            QueueSender::Unbounded(tx) => tx.send(message).is_ok(),
        }
    }

    /// Waiting enqueue, used for control messages that must not be shed.
    async fn send(&self, message: SinkMessage) -> bool {
        match self {
            QueueSender::Bounded(tx) => tx.send(message).await.is_ok(),
            QueueSender::Unbounded(tx) => tx.send(message).is_ok(),
        }
    }
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<SinkMessage>),
    Unbounded(mpsc::UnboundedReceiver<SinkMessage>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<SinkMessage> {
        match self {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// A sink that buffers structured log events and persists them to SQLite.
///
/// Opened with [`SqliteSink::open`], fed with [`SqliteSink::emit`], and
/// torn down with [`SqliteSink::close`]. All database work happens on
/// background tasks; `emit` never blocks beyond enqueueing.
pub struct SqliteSink {
    tx: QueueSender,
    worker: Mutex<Option<JoinHandle<Result<(), StoreError>>>>,
    retention: Arc<RetentionEngine>,
    schema: Arc<SchemaManager>,
    minimum_level: Level,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SqliteSink {
    /// Validates the options and starts the sink's background tasks.
    ///
    /// Validation failures are the only errors surfaced here; database
    /// I/O begins lazily with the first flushed batch. Must be called
    /// within a Tokio runtime.
    pub fn open(options: SinkOptions) -> Result<SqliteSink, ConfigError> {
        options.validate()?;

        let schema = Arc::new(SchemaManager::new(&options));
        let writer = BatchWriter::new(Arc::clone(&schema), &options);
        let retention = RetentionEngine::start(Arc::clone(&schema), &options);

        let (tx, rx) = match options.queue_limit {
            Some(limit) => {
                let (tx, rx) = mpsc::channel(limit);
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
        };

        let worker = tokio::spawn(batch_loop(
            writer,
            rx,
            options.batch_size,
            options.batch_period,
            options.error_callback.clone(),
            options.propagate_errors,
        ));

        info!("SQLite sink opened for table \"{}\"", options.table_name);
        Ok(SqliteSink {
            tx,
            worker: Mutex::new(Some(worker)),
            retention,
            schema,
            minimum_level: options.minimum_level,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Accepts an event for eventual persistence.
    ///
    /// Events below the minimum level are discarded. When the bounded
    /// queue is full the event is dropped rather than blocking the
    /// caller. After [`close`](Self::close) this is a silent no-op.
    pub fn emit(&self, event: LogEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if event.level < self.minimum_level {
            return;
        }
        if !self.tx.try_send(SinkMessage::Event(event)) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Log queue full, dropping event ({dropped} dropped so far)");
        }
    }

    /// Writes everything currently queued and returns the result.
    ///
    /// With `propagate_errors` disabled the write result is still reported
    /// through the error callback, and this returns `Ok`.
    pub async fn flush(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if !self.tx.send(SinkMessage::Flush(ack_tx)).await {
            return Err(StoreError::Closed);
        }
        ack_rx.await.unwrap_or(Err(StoreError::Closed))
    }

    /// Stops the retention loop, flushes the remaining queue, and releases
    /// the database. Idempotent; later `emit` calls are silent no-ops.
    ///
    /// With `propagate_errors` enabled, a write failure that stopped the
    /// batching loop is returned here.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.retention.shutdown().await;

        let _ = self.tx.send(SinkMessage::Shutdown).await;
        let worker = self.worker.lock().await.take();
        let result = match worker {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Batch task panicked: {e}");
                    Ok(())
                }
            },
            None => Ok(()),
        };

        if let Err(e) = self.schema.checkpoint().await {
            warn!("Failed to checkpoint WAL file (this is non-critical): {e}");
        }
        self.schema.close().await;

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("{dropped} events were dropped due to a full queue");
        }
        info!("SQLite sink shutdown complete");
        result
    }

    /// Number of rows currently persisted.
    pub async fn row_count(&self) -> Result<u64, StoreError> {
        self.schema.row_count().await
    }

    /// On-disk size of the database in bytes (zero for in-memory stores).
    pub async fn store_size_bytes(&self) -> Result<u64, StoreError> {
        self.schema.store_size_bytes().await
    }

    /// Runs one retention pass immediately, regardless of the scheduled
    /// loop. Returns the number of rows deleted; a no-op when no policy is
    /// configured.
    pub async fn run_retention(&self) -> Result<u64, StoreError> {
        self.retention.run_once().await
    }

    /// Compacts the database file. Slow; never call on a hot path.
    pub async fn compact(&self) -> Result<(), StoreError> {
        self.schema.compact().await
    }
}

async fn batch_loop(
    writer: BatchWriter,
    mut rx: QueueReceiver,
    batch_size: usize,
    period: Duration,
    callback: Option<ErrorCallback>,
    propagate_errors: bool,
) -> Result<(), StoreError> {
    let mut buffer: Vec<LogEvent> = Vec::new();
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            message = rx.recv() => {
                match message {
                    Some(SinkMessage::Event(event)) => {
                        buffer.push(event);
                        if buffer.len() >= batch_size {
                            if let Err(e) = write_and_report(&writer, &mut buffer, &callback).await {
                                if propagate_errors {
                                    return Err(e);
                                }
                            }
                        }
                    }
                    Some(SinkMessage::Flush(ack)) => {
                        let result = write_and_report(&writer, &mut buffer, &callback).await;
                        let _ = ack.send(if propagate_errors { result } else { Ok(()) });
                    }
                    Some(SinkMessage::Shutdown) | None => {
                        debug!("Sink shutting down, flushing remaining events");
                        let result = write_and_report(&writer, &mut buffer, &callback).await;
                        return if propagate_errors { result } else { Ok(()) };
                    }
                }
            }
            // Periodic flush based on time interval
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    if let Err(e) = write_and_report(&writer, &mut buffer, &callback).await {
                        if propagate_errors {
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}

/// Writes the buffer as one batch. The buffer is consumed either way: a
/// failed batch is reported and dropped, never retried.
async fn write_and_report(
    writer: &BatchWriter,
    buffer: &mut Vec<LogEvent>,
    callback: &Option<ErrorCallback>,
) -> Result<(), StoreError> {
    let result = writer.write_batch(buffer).await;
    if let Err(e) = &result {
        error!("Failed to write batch of {} events: {e}", buffer.len());
        if let Some(callback) = callback {
            callback.call(e);
        }
    }
    buffer.clear();
    result
}
