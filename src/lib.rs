//! logsink library: buffered structured logging into SQLite
//!
//! This library accepts structured log events, buffers them in memory, and
//! writes them to a SQLite database in transactional batches. A background
//! retention loop keeps the database bounded by age, row count, and byte
//! size. Deployments can extend the schema with custom columns populated
//! from event properties.
//!
//! # Example
//!
//! ```no_run
//! use logsink::{Level, LogEvent, SinkOptions, SqliteSink, StoreLocation};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SinkOptions {
//!     location: StoreLocation::File("logs.db".into()),
//!     ..Default::default()
//! };
//!
//! let sink = SqliteSink::open(options)?;
//! sink.emit(LogEvent::new(Level::Information, "service started"));
//! sink.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. `SqliteSink::open` spawns the
//! batching and retention tasks, so call it from within an async context.

#![warn(missing_docs)]

pub mod config;
mod error_handling;
mod event;
mod sink;
mod storage;

// Re-export public API
pub use config::{ExtensionColumn, JournalMode, SinkOptions, StoreLocation, SyncMode};
pub use error_handling::{ConfigError, ErrorCallback, StoreError};
pub use event::{ErrorInfo, Level, LogEvent, PropertyValue};
pub use sink::SqliteSink;
