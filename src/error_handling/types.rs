//! Error type definitions.
//!
//! This module defines the error types used throughout the sink, plus the
//! callback wrapper through which background failures are reported.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error types for sink configuration validation.
///
/// Raised synchronously by [`crate::SinkOptions::validate`] at sink
/// construction. Each variant names the setting that failed so callers can
/// correct the exact field.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric or duration setting has an unusable value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// An extension column definition is malformed.
    #[error("Invalid extension column at index {index}: {reason}")]
    InvalidExtensionColumn {
        /// Position of the column in the configured list.
        index: usize,
        /// Why the definition was rejected.
        reason: &'static str,
    },
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error creating the database file or its parent directory.
    #[error("Database file creation error: {0}")]
    FileCreation(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// The sink has been closed; no further writes are possible.
    #[error("Sink is closed")]
    Closed,
}

/// Callback invoked when a background write or retention pass fails.
///
/// Failures on the write and retention paths never reach producer threads
/// directly; this hook is how the host application observes them.
#[derive(Clone)]
pub struct ErrorCallback(Arc<dyn Fn(&StoreError) + Send + Sync>);

impl ErrorCallback {
    /// Wraps a closure as an error callback.
    pub fn new(f: impl Fn(&StoreError) + Send + Sync + 'static) -> Self {
        ErrorCallback(Arc::new(f))
    }

    /// Invokes the callback with the given error.
    pub fn call(&self, err: &StoreError) {
        (self.0)(err)
    }
}

impl fmt::Debug for ErrorCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorCallback(..)")
    }
}
