//! Sink configuration and constants.
//!
//! This module provides:
//! - Configuration constants (batch sizes, intervals, tuning defaults)
//! - Option types for constructing a sink
//! - Eager validation of every numeric and duration setting

pub(crate) mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{ExtensionColumn, JournalMode, SinkOptions, StoreLocation, SyncMode};
