//! Error handling for the sink.
//!
//! This module provides:
//! - Error type definitions for configuration validation and store I/O
//! - The error callback wrapper used to report background failures
//!
//! Error types are split into two families:
//! - **Configuration errors**: surfaced synchronously at sink construction
//! - **Store errors**: asynchronous I/O failures reported via the callback

mod types;

// Re-export public API
pub use types::{ConfigError, ErrorCallback, StoreError};
